use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use slp_crypto::Digest;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error reading config file")]
    Io(#[from] std::io::Error),

    #[error("error decoding config file")]
    Json(#[from] serde_json::Error),

    #[error("missing config key '{0}'")]
    MissingKey(String),

    #[error("config key '{0}' holds an unexpected value")]
    InvalidValue(String),

    #[error("invalid poh digest")]
    Digest(#[from] slp_crypto::hash::UnknownDigest),

    #[error("invalid serialized regex")]
    Regex(#[from] regex::Error),
}

/// A point-in-time override of protocol parameters, active from `height` on.
#[derive(Debug, Clone)]
pub struct Milestone {
    pub height: u64,
    pub parameters: Map<String, Value>,
}

/// A named network: a top-level settings map overlaid on a height-sorted
/// milestone list.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    name: String,
    top: Map<String, Value>,
    milestones: Vec<Milestone>,
}

impl NetworkConfig {
    /// Reads `{name}.json` and `milestones.json` from `folder`.
    pub fn load(folder: &Path, name: &str) -> Result<Self, ConfigError> {
        let top = fs::read_to_string(folder.join(format!("{name}.json")))?;
        let milestones = fs::read_to_string(folder.join("milestones.json"))?;
        Self::from_values(name, serde_json::from_str(&top)?, serde_json::from_str(&milestones)?)
    }

    /// Builds a config from already-decoded JSON values. Milestones come as
    /// a map of activation height to parameter overrides.
    pub fn from_values(name: &str, top: Value, milestones: Value) -> Result<Self, ConfigError> {
        let top = match top {
            Value::Object(map) => map,
            _ => return Err(ConfigError::InvalidValue(name.to_string())),
        };
        let raw = match milestones {
            Value::Object(map) => map,
            _ => return Err(ConfigError::InvalidValue("milestones".to_string())),
        };
        let mut milestones = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let height = key
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue(format!("milestone '{key}'")))?;
            let parameters = match value {
                Value::Object(map) => map,
                _ => return Err(ConfigError::InvalidValue(format!("milestone '{key}'"))),
            };
            milestones.push(Milestone { height, parameters });
        }
        milestones.sort_by_key(|m| m.height);
        Ok(Self {
            name: name.to_string(),
            top,
            milestones,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lowest milestone activation height, i.e. where indexing starts.
    pub fn first_milestone_height(&self) -> u64 {
        self.milestones.first().map(|m| m.height).unwrap_or(0)
    }

    /// Looks a key up: a top-level entry wins outright, otherwise the
    /// milestones active at `height` (all of them when `height` is `None`)
    /// are folded in activation order. Scalars overwrite, objects
    /// shallow-merge, arrays concatenate and deduplicate.
    pub fn ask(&self, key: &str, height: Option<u64>) -> Option<Value> {
        if let Some(value) = self.top.get(key) {
            return Some(value.clone());
        }
        let mut merged: Option<Value> = None;
        for milestone in &self.milestones {
            if height.is_some_and(|h| milestone.height > h) {
                break;
            }
            if let Some(value) = milestone.parameters.get(key) {
                merged = Some(match merged.take() {
                    None => value.clone(),
                    Some(acc) => merge(acc, value),
                });
            }
        }
        merged
    }

    fn ask_str(&self, key: &str, height: Option<u64>) -> Result<String, ConfigError> {
        match self.ask(key, height) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ConfigError::InvalidValue(key.to_string())),
            None => Err(ConfigError::MissingKey(key.to_string())),
        }
    }

    fn ask_u64(&self, key: &str, height: Option<u64>) -> Result<u64, ConfigError> {
        match self.ask(key, height) {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| ConfigError::InvalidValue(key.to_string())),
            Some(_) => Err(ConfigError::InvalidValue(key.to_string())),
            None => Err(ConfigError::MissingKey(key.to_string())),
        }
    }

    pub fn database_name(&self) -> Result<String, ConfigError> {
        self.ask_str("database name", None)
    }

    pub fn api_peer(&self) -> Result<String, ConfigError> {
        self.ask_str("api peer", None)
    }

    pub fn webhook_peer(&self) -> Result<String, ConfigError> {
        self.ask_str("webhook peer", None)
    }

    pub fn master_address(&self) -> Result<String, ConfigError> {
        self.ask_str("master address", None)
    }

    pub fn blocktime(&self) -> Result<f64, ConfigError> {
        match self.ask("blocktime", None) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ConfigError::InvalidValue("blocktime".to_string())),
            Some(_) => Err(ConfigError::InvalidValue("blocktime".to_string())),
            None => Err(ConfigError::MissingKey("blocktime".to_string())),
        }
    }

    pub fn peer_limit(&self) -> usize {
        self.ask_u64("peer limit", None).unwrap_or(10) as usize
    }

    pub fn message_memory_size(&self) -> usize {
        self.ask_u64("message memory size", None).unwrap_or(20) as usize
    }

    pub fn log_level(&self) -> String {
        self.ask_str("log level", None).unwrap_or_else(|_| "info".to_string())
    }

    pub fn poh_digest(&self) -> Result<Digest, ConfigError> {
        match self.ask("poh digest", None) {
            Some(Value::String(s)) => Ok(s.parse()?),
            Some(_) => Err(ConfigError::InvalidValue("poh digest".to_string())),
            None => Ok(Digest::Sha256),
        }
    }

    pub fn serialized_regex(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&self.ask_str("serialized regex", None)?)?)
    }

    pub fn slp_types(&self, height: Option<u64>) -> Result<Vec<String>, ConfigError> {
        self.string_list("slp types", height)
    }

    pub fn slp_fields(&self, height: Option<u64>) -> Result<Vec<String>, ConfigError> {
        self.string_list("slp fields", height)
    }

    pub fn denied_tickers(&self) -> Vec<String> {
        self.string_list("denied tickers", None).unwrap_or_default()
    }

    /// Cost floor of an operation; 1 when the milestone table has no entry.
    pub fn cost(&self, slp_type: &str, op: &str, height: Option<u64>) -> u64 {
        self.ask("cost", height)
            .as_ref()
            .and_then(|v| v.get(slp_type))
            .and_then(|v| v.get(op))
            .and_then(Value::as_u64)
            .unwrap_or(1)
    }

    /// Ordered operation-name to opcode table for a family era.
    pub fn input_types(&self, height: Option<u64>) -> Result<BTreeMap<String, u8>, ConfigError> {
        let value = self
            .ask("input types", height)
            .ok_or_else(|| ConfigError::MissingKey("input types".to_string()))?;
        let map = value
            .as_object()
            .ok_or_else(|| ConfigError::InvalidValue("input types".to_string()))?;
        let mut out = BTreeMap::new();
        for (name, code) in map {
            let code = code
                .as_u64()
                .and_then(|c| u8::try_from(c).ok())
                .ok_or_else(|| ConfigError::InvalidValue("input types".to_string()))?;
            out.insert(name.clone(), code);
        }
        Ok(out)
    }

    /// Reverse lookup in the input-type table.
    pub fn type_for_code(&self, code: u8, height: Option<u64>) -> Result<String, ConfigError> {
        self.input_types(height)?
            .into_iter()
            .find(|(_, c)| *c == code)
            .map(|(name, _)| name)
            .ok_or_else(|| ConfigError::InvalidValue(format!("input type code {code}")))
    }

    /// The milestone's fixed-header formats for a family: a list of atom
    /// name lists, indexed by wire variant (genesis, fungible/generic, ...).
    pub fn slp_formats(
        &self,
        slp_type: &str,
        height: Option<u64>,
    ) -> Result<Vec<Vec<String>>, ConfigError> {
        let value = self
            .ask("slp formats", height)
            .ok_or_else(|| ConfigError::MissingKey("slp formats".to_string()))?;
        let families = value
            .as_object()
            .ok_or_else(|| ConfigError::InvalidValue("slp formats".to_string()))?;
        let formats = families
            .get(slp_type)
            .and_then(Value::as_array)
            .ok_or_else(|| ConfigError::InvalidValue(format!("slp formats for {slp_type}")))?;
        formats
            .iter()
            .map(|format| {
                format
                    .as_array()
                    .map(|atoms| {
                        atoms
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .ok_or_else(|| {
                        ConfigError::InvalidValue(format!("slp formats for {slp_type}"))
                    })
            })
            .collect()
    }

    fn string_list(&self, key: &str, height: Option<u64>) -> Result<Vec<String>, ConfigError> {
        match self.ask(key, height) {
            Some(Value::Array(items)) => Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()),
            Some(_) => Err(ConfigError::InvalidValue(key.to_string())),
            None => Err(ConfigError::MissingKey(key.to_string())),
        }
    }
}

/// Milestone composition: scalars overwrite, objects shallow-merge, arrays
/// concatenate and deduplicate preserving first-seen order.
fn merge(acc: Value, next: &Value) -> Value {
    match (acc, next) {
        (Value::Object(mut base), Value::Object(over)) => {
            for (key, value) in over {
                base.insert(key.clone(), value.clone());
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(over)) => {
            for item in over {
                if !base.contains(item) {
                    base.push(item.clone());
                }
            }
            Value::Array(base)
        }
        (_, scalar) => scalar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NetworkConfig {
        NetworkConfig::from_values(
            "testnet",
            json!({
                "database name": "slp_testnet",
                "master address": "M",
                "blocktime": 8,
            }),
            json!({
                "100": {
                    "slp types": ["_slp1"],
                    "cost": {"_slp1": {"GENESIS": 100}},
                    "limits": {"a": 1, "b": 2},
                },
                "500": {
                    "slp types": ["_slp1", "_slp2"],
                    "cost": {"_slp2": {"GENESIS": 50}},
                    "limits": {"b": 3},
                },
            }),
        )
        .unwrap()
    }

    #[test]
    fn top_level_wins() {
        let cfg = sample();
        assert_eq!(cfg.master_address().unwrap(), "M");
        assert_eq!(cfg.database_name().unwrap(), "slp_testnet");
    }

    #[test]
    fn milestones_apply_by_height() {
        let cfg = sample();
        assert_eq!(
            cfg.slp_types(Some(100)).unwrap(),
            vec!["_slp1".to_string()]
        );
        assert_eq!(
            cfg.slp_types(Some(501)).unwrap(),
            vec!["_slp1".to_string(), "_slp2".to_string()]
        );
        assert!(cfg.ask("slp types", Some(99)).is_none());
    }

    #[test]
    fn mappings_shallow_merge() {
        let cfg = sample();
        let limits = cfg.ask("limits", None).unwrap();
        assert_eq!(limits["a"], 1);
        assert_eq!(limits["b"], 3);
        // costs from both milestones survive side by side
        assert_eq!(cfg.cost("_slp1", "GENESIS", None), 100);
        assert_eq!(cfg.cost("_slp2", "GENESIS", None), 50);
        assert_eq!(cfg.cost("_slp1", "SEND", None), 1);
    }

    #[test]
    fn first_milestone_height_drives_backfill_start() {
        assert_eq!(sample().first_milestone_height(), 100);
    }
}
