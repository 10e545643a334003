use serde_json::json;
use tempfile::TempDir;

use slp_applying::{apply, Context, Verdict};
use slp_codec::Payload;
use slp_configs::NetworkConfig;
use slp_crypto::{token_id, Digest};
use slp_db::{BlockStamp, Record, Store};

pub fn test_config() -> NetworkConfig {
    NetworkConfig::from_values(
        "testnet",
        json!({
            "database name": "slp_testnet",
            "master address": "M",
            "blocktime": 8,
        }),
        json!({
            "1": {
                "slp types": ["_slp1", "_slp2"],
                "cost": {
                    "_slp1": {"GENESIS": 100},
                    "_slp2": {"GENESIS": 100},
                },
            },
        }),
    )
    .unwrap()
}

pub struct Bed {
    pub store: Store,
    pub config: NetworkConfig,
    _dir: TempDir,
}

impl Bed {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), Digest::Sha256).unwrap();
        Self {
            store,
            config: test_config(),
            _dir: dir,
        }
    }

    /// Journals one transaction and runs the engine over it, the way the
    /// block parser would.
    pub fn feed(
        &self,
        height: u64,
        index: u16,
        emitter: &str,
        receiver: &str,
        cost: u64,
        mut op: Payload,
    ) -> (BlockStamp, Verdict) {
        let stamp = BlockStamp::new(height, index);
        let txid = txid_at(height, index);
        if op.is_genesis() {
            let id = token_id(
                op.family().as_str(),
                op.symbol().unwrap_or_default(),
                height,
                &txid,
            );
            op.bind_token_id(id);
        }
        let record = Record {
            stamp,
            txid,
            emitter: emitter.to_string(),
            receiver: receiver.to_string(),
            cost,
            timestamp: 0.0,
            legit: None,
            poh: None,
            op,
        };
        self.store.append_record(&record).unwrap();
        let ctx = Context {
            store: &self.store,
            config: &self.config,
        };
        let verdict = apply(&ctx, stamp).unwrap();
        (stamp, verdict)
    }

    pub fn replay(&self, stamp: BlockStamp) -> Verdict {
        let ctx = Context {
            store: &self.store,
            config: &self.config,
        };
        apply(&ctx, stamp).unwrap()
    }
}

pub fn txid_at(height: u64, index: u16) -> String {
    format!("{:064x}", height * 1000 + u64::from(index))
}
