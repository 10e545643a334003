//! Typed operation model
//!
//! Each journal record carries exactly one protocol operation. Operations
//! are a closed set per family and each variant holds only the fields its
//! wire layout permits, so downstream validation is total over the tag.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use slp_math::Decimal;

use crate::CodecError;

/// Protocol family of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    #[serde(rename = "_slp1")]
    Slp1,
    #[serde(rename = "_slp2")]
    Slp2,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Slp1 => "_slp1",
            Family::Slp2 => "_slp2",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "_slp1" => Ok(Family::Slp1),
            "_slp2" => Ok(Family::Slp2),
            other => Err(CodecError::UnknownSlpType(other.to_string())),
        }
    }
}

/// Fungible-token family operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slp1Op {
    Genesis {
        /// Derived from the genesis coordinates once the record is bound
        /// to a transaction; empty straight off the wire.
        id: String,
        de: u8,
        qt: Decimal,
        sy: String,
        na: String,
        du: String,
        no: String,
        pa: bool,
        mi: bool,
    },
    Burn { id: String, qt: Decimal, no: String },
    Mint { id: String, qt: Decimal, no: String },
    Send { id: String, qt: Decimal, no: String },
    Pause { id: String, no: String },
    Resume { id: String, no: String },
    NewOwner { id: String, no: String },
    Freeze { id: String, no: String },
    Unfreeze { id: String, no: String },
}

/// Metadata-token family operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slp2Op {
    Genesis {
        id: String,
        sy: String,
        na: String,
        du: String,
        no: String,
        pa: bool,
    },
    Pause { id: String, no: String },
    Resume { id: String, no: String },
    NewOwner { id: String, no: String },
    AuthMeta { id: String, no: String },
    RevokeMeta { id: String, no: String },
    Clone { id: String, no: String },
    AddMeta {
        id: String,
        ch: u8,
        /// Set when the pair form `na -> dt` is used instead of a JSON
        /// object in `dt`.
        na: Option<String>,
        dt: String,
    },
    VoidMeta { id: String, tx: String },
}

/// One decoded contract payload: family plus operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Slp1(Slp1Op),
    Slp2(Slp2Op),
}

impl Slp1Op {
    pub fn op_name(&self) -> &'static str {
        match self {
            Slp1Op::Genesis { .. } => "GENESIS",
            Slp1Op::Burn { .. } => "BURN",
            Slp1Op::Mint { .. } => "MINT",
            Slp1Op::Send { .. } => "SEND",
            Slp1Op::Pause { .. } => "PAUSE",
            Slp1Op::Resume { .. } => "RESUME",
            Slp1Op::NewOwner { .. } => "NEWOWNER",
            Slp1Op::Freeze { .. } => "FREEZE",
            Slp1Op::Unfreeze { .. } => "UNFREEZE",
        }
    }

    pub fn token_id(&self) -> &str {
        match self {
            Slp1Op::Genesis { id, .. }
            | Slp1Op::Burn { id, .. }
            | Slp1Op::Mint { id, .. }
            | Slp1Op::Send { id, .. }
            | Slp1Op::Pause { id, .. }
            | Slp1Op::Resume { id, .. }
            | Slp1Op::NewOwner { id, .. }
            | Slp1Op::Freeze { id, .. }
            | Slp1Op::Unfreeze { id, .. } => id,
        }
    }

    pub fn quantity(&self) -> Option<&Decimal> {
        match self {
            Slp1Op::Genesis { qt, .. }
            | Slp1Op::Burn { qt, .. }
            | Slp1Op::Mint { qt, .. }
            | Slp1Op::Send { qt, .. } => Some(qt),
            _ => None,
        }
    }
}

impl Slp2Op {
    pub fn op_name(&self) -> &'static str {
        match self {
            Slp2Op::Genesis { .. } => "GENESIS",
            Slp2Op::Pause { .. } => "PAUSE",
            Slp2Op::Resume { .. } => "RESUME",
            Slp2Op::NewOwner { .. } => "NEWOWNER",
            Slp2Op::AuthMeta { .. } => "AUTHMETA",
            Slp2Op::RevokeMeta { .. } => "REVOKEMETA",
            Slp2Op::Clone { .. } => "CLONE",
            Slp2Op::AddMeta { .. } => "ADDMETA",
            Slp2Op::VoidMeta { .. } => "VOIDMETA",
        }
    }

    pub fn token_id(&self) -> &str {
        match self {
            Slp2Op::Genesis { id, .. }
            | Slp2Op::Pause { id, .. }
            | Slp2Op::Resume { id, .. }
            | Slp2Op::NewOwner { id, .. }
            | Slp2Op::AuthMeta { id, .. }
            | Slp2Op::RevokeMeta { id, .. }
            | Slp2Op::Clone { id, .. }
            | Slp2Op::AddMeta { id, .. }
            | Slp2Op::VoidMeta { id, .. } => id,
        }
    }
}

impl Payload {
    pub fn family(&self) -> Family {
        match self {
            Payload::Slp1(_) => Family::Slp1,
            Payload::Slp2(_) => Family::Slp2,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            Payload::Slp1(op) => op.op_name(),
            Payload::Slp2(op) => op.op_name(),
        }
    }

    pub fn token_id(&self) -> &str {
        match self {
            Payload::Slp1(op) => op.token_id(),
            Payload::Slp2(op) => op.token_id(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(
            self,
            Payload::Slp1(Slp1Op::Genesis { .. }) | Payload::Slp2(Slp2Op::Genesis { .. })
        )
    }

    /// Genesis symbol, when the operation declares one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Payload::Slp1(Slp1Op::Genesis { sy, .. }) => Some(sy),
            Payload::Slp2(Slp2Op::Genesis { sy, .. }) => Some(sy),
            _ => None,
        }
    }

    /// Binds a derived token id to a genesis payload; no-op for other ops,
    /// whose ids come off the wire.
    pub fn bind_token_id(&mut self, token_id: String) {
        match self {
            Payload::Slp1(Slp1Op::Genesis { id, .. }) => *id = token_id,
            Payload::Slp2(Slp2Op::Genesis { id, .. }) => *id = token_id,
            _ => {}
        }
    }

    /// The canonical field bag of the operation: exactly the fields this op
    /// carries, keyed by their short protocol names. Quantities render as
    /// decimal strings so the bag hashes identically on every node.
    pub fn field_bag(&self) -> BTreeMap<String, Value> {
        let mut bag = BTreeMap::new();
        bag.insert("tp".to_string(), Value::from(self.op_name()));
        match self {
            Payload::Slp1(Slp1Op::Genesis {
                id, de, qt, sy, na, du, no, pa, mi,
            }) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("de".to_string(), Value::from(*de));
                bag.insert("qt".to_string(), Value::from(qt.to_string()));
                bag.insert("sy".to_string(), Value::from(sy.as_str()));
                bag.insert("na".to_string(), Value::from(na.as_str()));
                bag.insert("du".to_string(), Value::from(du.as_str()));
                bag.insert("no".to_string(), Value::from(no.as_str()));
                bag.insert("pa".to_string(), Value::from(*pa));
                bag.insert("mi".to_string(), Value::from(*mi));
            }
            Payload::Slp1(
                Slp1Op::Burn { id, qt, no }
                | Slp1Op::Mint { id, qt, no }
                | Slp1Op::Send { id, qt, no },
            ) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("qt".to_string(), Value::from(qt.to_string()));
                bag.insert("no".to_string(), Value::from(no.as_str()));
            }
            Payload::Slp1(
                Slp1Op::Pause { id, no }
                | Slp1Op::Resume { id, no }
                | Slp1Op::NewOwner { id, no }
                | Slp1Op::Freeze { id, no }
                | Slp1Op::Unfreeze { id, no },
            ) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("no".to_string(), Value::from(no.as_str()));
            }
            Payload::Slp2(Slp2Op::Genesis { id, sy, na, du, no, pa }) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("sy".to_string(), Value::from(sy.as_str()));
                bag.insert("na".to_string(), Value::from(na.as_str()));
                bag.insert("du".to_string(), Value::from(du.as_str()));
                bag.insert("no".to_string(), Value::from(no.as_str()));
                bag.insert("pa".to_string(), Value::from(*pa));
            }
            Payload::Slp2(
                Slp2Op::Pause { id, no }
                | Slp2Op::Resume { id, no }
                | Slp2Op::NewOwner { id, no }
                | Slp2Op::AuthMeta { id, no }
                | Slp2Op::RevokeMeta { id, no }
                | Slp2Op::Clone { id, no },
            ) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("no".to_string(), Value::from(no.as_str()));
            }
            Payload::Slp2(Slp2Op::AddMeta { id, ch, na, dt }) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("ch".to_string(), Value::from(*ch));
                if let Some(na) = na {
                    bag.insert("na".to_string(), Value::from(na.as_str()));
                }
                bag.insert("dt".to_string(), Value::from(dt.as_str()));
            }
            Payload::Slp2(Slp2Op::VoidMeta { id, tx }) => {
                bag.insert("id".to_string(), Value::from(id.as_str()));
                bag.insert("tx".to_string(), Value::from(tx.as_str()));
            }
        }
        bag
    }

    /// Rebuilds a payload from a JSON field bag, the shape carried by JSON
    /// vendor fields (`{"_slp1": {"tp": "SEND", ...}}` inner object).
    pub fn from_bag(family: Family, bag: &Map<String, Value>) -> Result<Self, CodecError> {
        let tp = req_str(bag, "tp")?;
        match family {
            Family::Slp1 => {
                let op = match tp.as_str() {
                    "GENESIS" => Slp1Op::Genesis {
                        id: opt_str(bag, "id"),
                        de: opt_u8(bag, "de")?,
                        qt: req_qt(bag)?,
                        sy: req_str(bag, "sy")?,
                        na: req_str(bag, "na")?,
                        du: opt_str(bag, "du"),
                        no: opt_str(bag, "no"),
                        pa: opt_bool(bag, "pa")?,
                        mi: opt_bool(bag, "mi")?,
                    },
                    "BURN" => Slp1Op::Burn { id: req_str(bag, "id")?, qt: req_qt(bag)?, no: opt_str(bag, "no") },
                    "MINT" => Slp1Op::Mint { id: req_str(bag, "id")?, qt: req_qt(bag)?, no: opt_str(bag, "no") },
                    "SEND" => Slp1Op::Send { id: req_str(bag, "id")?, qt: req_qt(bag)?, no: opt_str(bag, "no") },
                    "PAUSE" => Slp1Op::Pause { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "RESUME" => Slp1Op::Resume { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "NEWOWNER" => Slp1Op::NewOwner { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "FREEZE" => Slp1Op::Freeze { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "UNFREEZE" => Slp1Op::Unfreeze { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    _ => return Err(CodecError::InvalidField("tp")),
                };
                Ok(Payload::Slp1(op))
            }
            Family::Slp2 => {
                let op = match tp.as_str() {
                    "GENESIS" => Slp2Op::Genesis {
                        id: opt_str(bag, "id"),
                        sy: req_str(bag, "sy")?,
                        na: req_str(bag, "na")?,
                        du: opt_str(bag, "du"),
                        no: opt_str(bag, "no"),
                        pa: opt_bool(bag, "pa")?,
                    },
                    "PAUSE" => Slp2Op::Pause { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "RESUME" => Slp2Op::Resume { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "NEWOWNER" => Slp2Op::NewOwner { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "AUTHMETA" => Slp2Op::AuthMeta { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "REVOKEMETA" => Slp2Op::RevokeMeta { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "CLONE" => Slp2Op::Clone { id: req_str(bag, "id")?, no: opt_str(bag, "no") },
                    "ADDMETA" => Slp2Op::AddMeta {
                        id: req_str(bag, "id")?,
                        ch: opt_u8(bag, "ch")?.max(1),
                        na: match opt_str(bag, "na") {
                            s if s.is_empty() => None,
                            s => Some(s),
                        },
                        dt: req_str(bag, "dt")?,
                    },
                    "VOIDMETA" => Slp2Op::VoidMeta {
                        id: req_str(bag, "id")?,
                        tx: req_str(bag, "tx")?,
                    },
                    _ => return Err(CodecError::InvalidField("tp")),
                };
                Ok(Payload::Slp2(op))
            }
        }
    }
}

fn req_str(bag: &Map<String, Value>, key: &'static str) -> Result<String, CodecError> {
    bag.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(CodecError::InvalidField(key))
}

fn opt_str(bag: &Map<String, Value>, key: &str) -> String {
    bag.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_u8(bag: &Map<String, Value>, key: &'static str) -> Result<u8, CodecError> {
    match bag.get(key) {
        None => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or(CodecError::InvalidField(key)),
    }
}

fn opt_bool(bag: &Map<String, Value>, key: &'static str) -> Result<bool, CodecError> {
    match bag.get(key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        // the historical wire tolerated 0/1
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(CodecError::InvalidField(key)),
        },
        Some(_) => Err(CodecError::InvalidField(key)),
    }
}

fn req_qt(bag: &Map<String, Value>) -> Result<Decimal, CodecError> {
    match bag.get("qt") {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Ok(Decimal::from(v))
            } else if let Some(v) = n.as_f64() {
                Ok(Decimal::try_from(v)?)
            } else {
                Err(CodecError::InvalidField("qt"))
            }
        }
        Some(Value::String(s)) => s.parse().map_err(|_| CodecError::InvalidField("qt")),
        _ => Err(CodecError::InvalidField("qt")),
    }
}
