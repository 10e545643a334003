use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown digest name '{0}'")]
pub struct UnknownDigest(String);

/// The hash function a network commits to for its proof-of-history chain.
///
/// The choice is part of the network identity: peers hashing with different
/// digests can never reach consent on a record. MD5 is retained only for
/// networks that predate the SHA-256 milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    Sha256,
    Md5,
}

impl Digest {
    pub fn hex(&self, bytes: &[u8]) -> String {
        match self {
            Digest::Sha256 => sha256_hex(bytes),
            Digest::Md5 => md5_hex(bytes),
        }
    }
}

impl FromStr for Digest {
    type Err = UnknownDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Digest::Sha256),
            "md5" => Ok(Digest::Md5),
            other => Err(UnknownDigest(other.to_string())),
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Digest::Sha256 => write!(f, "sha256"),
            Digest::Md5 => write!(f, "md5"),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Canonical JSON of a field bag: keys sorted, no whitespace.
///
/// Every node must derive byte-identical seeds from the same record, so the
/// bag is a `BTreeMap` and serialization is the compact form.
pub fn canonical_json(bag: &BTreeMap<String, serde_json::Value>) -> String {
    serde_json::to_string(bag).unwrap_or_default()
}

/// Digest of the canonical JSON of a field bag, as lowercase hex.
pub fn seed_hex(digest: Digest, bag: &BTreeMap<String, serde_json::Value>) -> String {
    digest.hex(canonical_json(bag).as_bytes())
}

/// One proof-of-history step: hash the previous PoH hex concatenated with
/// the record seed hex. The first record of a family chains from "".
pub fn chain_poh(digest: Digest, previous: &str, seed: &str) -> String {
    let mut joined = String::with_capacity(previous.len() + seed.len());
    joined.push_str(previous);
    joined.push_str(seed);
    digest.hex(joined.as_bytes())
}

/// Token id derivation: `md5(FAMILY.symbol.height.txid)`.
///
/// Always MD5 regardless of the network digest, because ids must fit the 16
/// raw bytes the smartbridge fixed header reserves for them.
pub fn token_id(slp_type: &str, symbol: &str, height: u64, txid: &str) -> String {
    let raw = format!("{}.{}.{}.{}", slp_type.to_uppercase(), symbol, height, txid);
    md5_hex(raw.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_names_round_trip() {
        for digest in [Digest::Sha256, Digest::Md5] {
            assert_eq!(digest.to_string().parse::<Digest>().unwrap(), digest);
        }
        assert!("blake2b".parse::<Digest>().is_err());
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let mut bag = BTreeMap::new();
        bag.insert("qt".to_string(), serde_json::json!("1000"));
        bag.insert("id".to_string(), serde_json::json!("ab"));
        assert_eq!(canonical_json(&bag), r#"{"id":"ab","qt":"1000"}"#);
    }

    #[test]
    fn token_id_is_32_hex() {
        let id = token_id("_slp1", "TOK", 10, &"c".repeat(64));
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn chain_step_is_order_sensitive() {
        let a = chain_poh(Digest::Sha256, "", "aa");
        let b = chain_poh(Digest::Sha256, &a, "bb");
        let b_other = chain_poh(Digest::Sha256, &a, "cc");
        assert_ne!(b, b_other);
        assert_eq!(b, chain_poh(Digest::Sha256, &a, "bb"));
    }
}
