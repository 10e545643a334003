//! Block parser worker
//!
//! Drains the block queue one block at a time, under an exclusive lock so
//! journal appends and PoH derivation stay serial. A block whose fetched
//! transaction list does not match its announced count is pushed back to
//! the head of the queue and the serving peer is dropped.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use slp_applying::Context;
use slp_codec::{bridge, Payload};
use slp_configs::NetworkConfig;
use slp_crypto::token_id;
use slp_db::{BlockStamp, Record, Store};

use crate::client::{ApiClient, Block, BlockTime, Transaction};
use crate::validate::{dump_unvalidated, validate_bag};
use crate::ChainError;

/// Standard transfer transaction type.
const TRANSFER_TYPE: u32 = 0;

/// Reads a vendor field as a contract payload: JSON form first, then the
/// smartbridge codec. Anything else is silently ignored.
pub fn decode_vendor(config: &NetworkConfig, height: u64, vendor: &str) -> Option<Payload> {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(vendor) {
        if object.len() == 1 {
            let (slp_type, fields) = object.iter().next()?;
            let active = config.slp_types(Some(height)).ok()?;
            if !active.iter().any(|t| t == slp_type) {
                debug!(%slp_type, "unknown SLP contract found");
                return None;
            }
            let family = slp_type.parse().ok()?;
            return Payload::from_bag(family, fields.as_object()?).ok();
        }
        return None;
    }
    bridge::unpack(config, Some(height), vendor).ok()
}

/// Rebuilds a [`Block`] from a webhook delivery body
/// (`{"timestamp": ms, "event": ..., "data": {...}}`), homogenizing its
/// timestamp with the API shape.
pub fn block_from_webhook(body: &Value, blocktime: f64) -> Option<Block> {
    let data = body.get("data")?;
    let mut unix = body.get("timestamp")?.as_f64()? / 1000.0;
    unix -= unix % blocktime;
    Some(Block {
        id: data.get("id")?.as_str()?.to_string(),
        height: data.get("height")?.as_u64()?,
        transactions: data.get("numberOfTransactions")?.as_u64()?,
        timestamp: BlockTime {
            epoch: data.get("timestamp").and_then(Value::as_u64).unwrap_or(0),
            unix,
        },
    })
}

pub struct BlockParser {
    store: Store,
    config: NetworkConfig,
    client: ApiClient,
    data_dir: PathBuf,
    api_peer: String,
    rx: mpsc::Receiver<Block>,
    lock: Arc<Mutex<()>>,
    /// Freshly applied records, for whoever wants to ratify them.
    applied_tx: Option<mpsc::Sender<BlockStamp>>,
}

impl BlockParser {
    pub fn new(
        store: Store,
        config: NetworkConfig,
        client: ApiClient,
        data_dir: PathBuf,
        lock: Arc<Mutex<()>>,
        applied_tx: Option<mpsc::Sender<BlockStamp>>,
    ) -> Result<(mpsc::Sender<Block>, Self), ChainError> {
        let api_peer = config.api_peer()?;
        let (tx, rx) = mpsc::channel(256);
        Ok((
            tx,
            Self {
                store,
                config,
                client,
                data_dir,
                api_peer,
                rx,
                lock,
                applied_tx,
            },
        ))
    }

    /// Worker loop; exits cleanly when every queue sender is gone.
    pub async fn run(mut self) {
        let mut peers = self.client.select_peers(&self.api_peer).await;
        let mut peer = pick(&peers, &self.api_peer);
        let mut pending: VecDeque<Block> = VecDeque::new();

        loop {
            let block = match pending.pop_front() {
                Some(block) => block,
                None => match self.rx.recv().await {
                    Some(block) => block,
                    None => break,
                },
            };

            let guard = self.lock.lock().await;
            match self.parse_block(&peer, &block).await {
                Ok(stamps) => {
                    drop(guard);
                    info!(
                        height = block.height,
                        transactions = block.transactions,
                        records = stamps.len(),
                        "block parsed"
                    );
                    let ctx = Context {
                        store: &self.store,
                        config: &self.config,
                    };
                    // engine calls are sequential in transaction order
                    for stamp in stamps {
                        match slp_applying::apply(&ctx, stamp) {
                            Ok(slp_applying::Verdict::Applied) => {
                                if let Some(tx) = &self.applied_tx {
                                    let _ = tx.send(stamp).await;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => error!(%stamp, reason = %e, "engine failure"),
                        }
                    }
                }
                Err(e) => {
                    drop(guard);
                    error!(
                        height = block.height,
                        reason = %e,
                        "block parsing failed, pushing block back"
                    );
                    pending.push_front(block);
                    peers.retain(|p| p != &peer);
                    if peers.len() <= 1 {
                        peers = self.client.select_peers(&self.api_peer).await;
                    }
                    peer = pick(&peers, &self.api_peer);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
        info!("block parser clean exit");
    }

    /// Extracts and journals every SLP record of one block. The announced
    /// transaction count is an integrity gate against half-synced peers.
    async fn parse_block(&self, peer: &str, block: &Block) -> Result<Vec<BlockStamp>, ChainError> {
        let transactions = self.client.block_transactions(peer, &block.id).await?;
        if transactions.len() as u64 != block.transactions {
            return Err(ChainError::IntegrityBreach);
        }

        let blocktime = self.config.blocktime()?;
        let mut stamps = Vec::new();
        for (position, tx) in transactions.iter().enumerate() {
            if tx.kind != TRANSFER_TYPE {
                continue;
            }
            let Some(vendor) = tx.vendor_field.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let index = match u16::try_from(position + 1) {
                Ok(index) => index,
                Err(_) => break,
            };
            match self.extract_record(block, blocktime, index, tx, vendor) {
                Ok(Some(record)) => match self.store.append_record(&record) {
                    Ok(()) => stamps.push(record.stamp),
                    Err(e) => error!(txid = %tx.id, reason = %e, "record not journalled"),
                },
                Ok(None) => {}
                Err(e) => {
                    error!(txid = %tx.id, height = block.height, reason = %e, "error occured with tx")
                }
            }
        }
        Ok(stamps)
    }

    fn extract_record(
        &self,
        block: &Block,
        blocktime: f64,
        index: u16,
        tx: &Transaction,
        vendor: &str,
    ) -> Result<Option<Record>, ChainError> {
        let Some(mut op) = decode_vendor(&self.config, block.height, vendor) else {
            return Ok(None);
        };
        info!(slp_type = %op.family(), tp = op.op_name(), "SLP contract found");

        if op.is_genesis() {
            let symbol = op.symbol().unwrap_or_default().to_string();
            if self.config.denied_tickers().iter().any(|t| t == &symbol) {
                info!(%symbol, "ticker is denied");
                return Ok(None);
            }
            op.bind_token_id(token_id(
                op.family().as_str(),
                &symbol,
                block.height,
                &tx.id,
            ));
        }

        let interval = blocktime / (block.transactions as f64 + 1.0);
        let timestamp = block.timestamp.unix + interval * f64::from(index);

        let stamp = BlockStamp::new(block.height, index);
        let record = Record {
            stamp,
            txid: tx.id.clone(),
            emitter: tx.sender.clone(),
            receiver: tx.recipient.clone(),
            cost: tx.amount,
            timestamp,
            legit: None,
            poh: None,
            op,
        };

        let bag = record.field_bag();
        let allowed = self.config.slp_fields(Some(block.height))?;
        let input_types = self.config.input_types(Some(block.height))?;
        let fields_known = bag.keys().all(|k| allowed.iter().any(|f| f == k));
        if !fields_known || !validate_bag(&bag, &input_types) {
            error!(txid = %tx.id, "field validation did not pass");
            dump_unvalidated(&self.data_dir, record.family().as_str(), stamp, &bag)?;
            return Ok(None);
        }
        Ok(Some(record))
    }
}

fn pick(peers: &[String], fallback: &str) -> String {
    peers
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> NetworkConfig {
        NetworkConfig::from_values(
            "testnet",
            json!({
                "database name": "slp_testnet",
                "master address": "M",
                "blocktime": 8,
                "serialized regex": "^(_slp[0-9]+)://(.*)$",
                "denied tickers": ["XXX"],
            }),
            json!({
                "1": {
                    "slp types": ["_slp1", "_slp2"],
                    "input types": {
                        "GENESIS": 0, "BURN": 1, "MINT": 2, "SEND": 3,
                        "PAUSE": 4, "RESUME": 5, "NEWOWNER": 6,
                        "FREEZE": 7, "UNFREEZE": 8, "AUTHMETA": 9,
                        "ADDMETA": 10, "VOIDMETA": 11, "REVOKEMETA": 12,
                        "CLONE": 13,
                    },
                    "slp formats": {
                        "_slp1": [
                            ["u8", "u8", "u64", "bool", "bool"],
                            ["u8", "bytes16", "f64"],
                            ["u8", "bytes16"],
                        ],
                        "_slp2": [
                            ["u8", "bool"],
                            ["u8", "bytes16"],
                            ["u8", "bytes16", "bytes32"],
                        ],
                    },
                },
            }),
        )
        .unwrap()
    }

    #[test]
    fn json_vendor_fields_decode() {
        let cfg = config();
        let vendor = json!({
            "_slp1": {"tp": "SEND", "id": "ab".repeat(16), "qt": 250}
        })
        .to_string();
        let payload = decode_vendor(&cfg, 10, &vendor).unwrap();
        assert_eq!(payload.op_name(), "SEND");
        assert_eq!(payload.token_id(), "ab".repeat(16));
    }

    #[test]
    fn smartbridge_vendor_fields_decode() {
        let cfg = config();
        let op = Payload::Slp1(slp_codec::Slp1Op::Send {
            id: "ab".repeat(16),
            qt: slp_math::Decimal::from(250u64),
            no: String::new(),
        });
        let bridges = bridge::pack(&cfg, Some(10), &op).unwrap();
        let decoded = decode_vendor(&cfg, 10, &bridges[0]).unwrap();
        assert_eq!(decoded.op_name(), "SEND");
    }

    #[test]
    fn garbage_vendor_fields_are_ignored() {
        let cfg = config();
        assert!(decode_vendor(&cfg, 10, "thanks for the coffee").is_none());
        assert!(decode_vendor(&cfg, 10, "123").is_none());
        assert!(decode_vendor(&cfg, 10, "{\"memo\": 1}").is_none());
    }

    #[test]
    fn webhook_bodies_normalize_to_blocks() {
        let body = json!({
            "timestamp": 1_700_000_013_000u64,
            "event": "block.applied",
            "data": {
                "id": "deadbeef",
                "height": 42,
                "numberOfTransactions": 3,
                "timestamp": 123456,
            },
        });
        let block = block_from_webhook(&body, 8.0).unwrap();
        assert_eq!(block.height, 42);
        assert_eq!(block.transactions, 3);
        // floored to the blocktime grid
        assert_eq!(block.timestamp.unix as u64 % 8, 0);
        assert_eq!(block.timestamp.epoch, 123456);
    }
}
