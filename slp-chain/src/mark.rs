//! Back-fill processing mark
//!
//! A small JSON file that survives restarts: the last block handed to the
//! parser, the peer that served it, and whether a full rebuild was asked.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ChainError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMark {
    #[serde(rename = "last parsed block", default)]
    pub last_parsed_block: u64,

    #[serde(default)]
    pub peer: Option<String>,

    #[serde(default)]
    pub rebuild: bool,
}

fn mark_path(folder: &Path, database_name: &str) -> PathBuf {
    folder.join(format!("{database_name}.mark"))
}

impl ProcessingMark {
    /// Missing or unreadable files yield a fresh mark.
    pub fn load(folder: &Path, database_name: &str) -> Self {
        fs::read_to_string(mark_path(folder, database_name))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, folder: &Path, database_name: &str) -> Result<(), ChainError> {
        fs::create_dir_all(folder)?;
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(mark_path(folder, database_name), raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_round_trips_with_spaced_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mark = ProcessingMark {
            last_parsed_block: 4242,
            peer: Some("http://10.0.0.1:4003".to_string()),
            rebuild: false,
        };
        mark.save(dir.path(), "slp_testnet").unwrap();

        let raw = fs::read_to_string(dir.path().join("slp_testnet.mark")).unwrap();
        assert!(raw.contains("last parsed block"));

        let loaded = ProcessingMark::load(dir.path(), "slp_testnet");
        assert_eq!(loaded.last_parsed_block, 4242);
        assert_eq!(loaded.peer.as_deref(), Some("http://10.0.0.1:4003"));
    }

    #[test]
    fn missing_mark_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mark = ProcessingMark::load(dir.path(), "nothing");
        assert_eq!(mark.last_parsed_block, 0);
        assert!(mark.peer.is_none());
    }
}
