//! Pre-acceptance field validation
//!
//! Records reach the journal only when every field of their bag passes the
//! protocol's shape rules. Failures are not journalled at all; the bag is
//! appended to an `unvalidated.{slp_type}` file for diagnosis.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use slp_db::BlockStamp;
use slp_math::Decimal;

use crate::ChainError;

static ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap());
static SY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-zA-Z]{3,8}$").unwrap());
static NA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.{3,24}$").unwrap());
static DU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?|ipfs|ipns|dweb)://[a-z0-9/:%_+.,#?!@&=-]{3,180}$").unwrap());
static NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.{0,180}$").unwrap());
static TX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").unwrap());

fn quantity_ok(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.parse::<Decimal>().is_ok(),
        _ => false,
    }
}

fn field_ok(key: &str, value: &Value, input_types: &BTreeMap<String, u8>) -> bool {
    match key {
        "tp" => value
            .as_str()
            .map(|tp| input_types.contains_key(tp))
            .unwrap_or(false),
        "id" => value.as_str().map(|v| ID.is_match(v)).unwrap_or(false),
        "qt" => quantity_ok(value),
        "de" => value.as_u64().map(|v| v <= 8).unwrap_or(false),
        "sy" => value.as_str().map(|v| SY.is_match(v)).unwrap_or(false),
        "na" => value.as_str().map(|v| NA.is_match(v)).unwrap_or(false),
        "du" => value
            .as_str()
            .map(|v| v.is_empty() || DU.is_match(v))
            .unwrap_or(false),
        "no" => value.as_str().map(|v| NO.is_match(v)).unwrap_or(false),
        "pa" | "mi" => value.is_boolean(),
        "ch" => value.as_u64().is_some(),
        "dt" => value.as_str().map(|v| v.len() <= 256).unwrap_or(false),
        "tx" => value.as_str().map(|v| TX.is_match(v)).unwrap_or(false),
        // unknown fields do not fail validation
        _ => true,
    }
}

/// Validates a field bag against the milestone's rules; total over the bag.
pub fn validate_bag(
    bag: &BTreeMap<String, Value>,
    input_types: &BTreeMap<String, u8>,
) -> bool {
    let failed: Vec<&str> = bag
        .iter()
        .filter(|(key, value)| !field_ok(key, value, input_types))
        .map(|(key, _)| key.as_str())
        .collect();
    if !failed.is_empty() {
        debug!(?failed, "field validation did not pass");
    }
    failed.is_empty()
}

/// Appends a refused bag to `unvalidated.{slp_type}`, keyed by blockstamp.
pub fn dump_unvalidated(
    folder: &Path,
    slp_type: &str,
    stamp: BlockStamp,
    bag: &BTreeMap<String, Value>,
) -> Result<(), ChainError> {
    let path = folder.join(format!("unvalidated.{slp_type}"));
    let mut dump: Map<String, Value> = match fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => Map::new(),
    };
    dump.insert(
        stamp.to_string(),
        Value::Object(bag.clone().into_iter().collect()),
    );
    fs::create_dir_all(folder)?;
    fs::write(&path, serde_json::to_string_pretty(&dump)?)?;
    Ok(())
}
