//! Document model of the stores

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use slp_codec::{Family, Payload};
use slp_crypto::Digest;
use slp_math::Decimal;

/// Position of a transaction on the base layer, rendered `"H#I"`.
///
/// Blockstamps order records totally: by height, then by index within the
/// block. Wallet updates require strictly increasing stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockStamp {
    pub height: u64,
    pub index: u16,
}

impl BlockStamp {
    pub fn new(height: u64, index: u16) -> Self {
        Self { height, index }
    }

    /// The stamp new wallets start from; any real stamp exceeds it.
    pub fn origin() -> Self {
        Self::new(0, 0)
    }
}

impl fmt::Display for BlockStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.height, self.index)
    }
}

impl FromStr for BlockStamp {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('#') {
            Some((height, index)) => Ok(Self::new(height.parse()?, index.parse()?)),
            None => Ok(Self::new(s.parse()?, 0)),
        }
    }
}

impl Serialize for BlockStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One journal entry: the envelope of a base-layer transaction plus the
/// decoded contract operation it carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub stamp: BlockStamp,
    pub txid: String,
    pub emitter: String,
    pub receiver: String,
    /// Base-layer transfer amount, smallest unit.
    pub cost: u64,
    /// Unix seconds with sub-block interpolation.
    pub timestamp: f64,
    /// Unset until the engine rules on the record; flips exactly once.
    pub legit: Option<bool>,
    /// Assigned when `legit` flips to true; rejected records carry none.
    pub poh: Option<String>,
    pub op: Payload,
}

impl Record {
    pub fn family(&self) -> Family {
        self.op.family()
    }

    pub fn op_name(&self) -> &'static str {
        self.op.op_name()
    }

    pub fn token_id(&self) -> &str {
        self.op.token_id()
    }

    pub fn field_bag(&self) -> BTreeMap<String, serde_json::Value> {
        self.op.field_bag()
    }

    /// Digest of the canonical field bag: the PoH seed and the value
    /// broadcast in consensus messages.
    pub fn seed(&self, digest: Digest) -> String {
        slp_crypto::seed_hex(digest, &self.field_bag())
    }
}

/// Fungible-token supply counters, fixed-point at the token's scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSupply {
    pub global: Decimal,
    pub minted: Decimal,
    pub burned: Decimal,
    pub crossed: Decimal,
}

/// Derived token descriptor, unique on `token_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub token_id: String,
    pub stamp: BlockStamp,
    pub slp_type: Family,
    pub name: String,
    pub symbol: String,
    pub owner: String,
    pub document: String,
    pub notes: String,
    pub paused: bool,
    /// Declared decimal places; zero for metadata tokens.
    pub de: u8,
    /// Present for SLP1 contracts only.
    pub supply: Option<TokenSupply>,
}

/// Fungible wallet, unique on `(address, token_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slp1Wallet {
    pub address: String,
    pub token_id: String,
    pub block_stamp: BlockStamp,
    pub balance: Decimal,
    pub owner: bool,
    pub frozen: bool,
}

/// Metadata wallet: exists iff the address owns the token or is authorised
/// to edit its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slp2Wallet {
    pub address: String,
    pub token_id: String,
    pub block_stamp: BlockStamp,
    pub owner: bool,
    pub metadata: Vec<u8>,
}

/// A record the engine refused, with the first failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub record: Record,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blockstamp_renders_and_parses() {
        let stamp = BlockStamp::new(11, 1);
        assert_eq!(stamp.to_string(), "11#1");
        assert_eq!("11#1".parse::<BlockStamp>().unwrap(), stamp);
    }

    #[test]
    fn blockstamp_orders_by_height_then_index() {
        let a = BlockStamp::new(10, 9);
        let b = BlockStamp::new(11, 1);
        let c = BlockStamp::new(11, 2);
        assert!(a < b && b < c);
        assert!(BlockStamp::origin() < a);
    }
}
