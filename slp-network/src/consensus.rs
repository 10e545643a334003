//! Proof-of-history consensus
//!
//! To ratify a record, the node opens a pending entry bound to a callback
//! and broadcasts `consensus {origin, blockstamp, hash}`. Each peer answers
//! with `consent {blockstamp, poh}`: its own chain step for that position,
//! computed from its previous legit PoH and the advertised hash. Matching
//! consents count toward the quorum ⌈|peers|/2⌉; reaching it removes the
//! entry and fires the callback exactly once.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use slp_crypto::chain_poh;
use slp_db::BlockStamp;

use crate::node::Node;
use crate::NetworkError;

pub type QuorumCallback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusMsg {
    pub origin: String,
    pub blockstamp: BlockStamp,
    pub hash: String,
    /// Peer count pinned by the origin; forwarding never outlives it.
    #[serde(default)]
    pub n: usize,
    /// Visit counter, incremented at each forward.
    #[serde(default)]
    pub x: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentMsg {
    pub blockstamp: BlockStamp,
    pub poh: String,
}

struct Pending {
    poh: String,
    quorum: usize,
    callback: QuorumCallback,
}

/// Pending ratifications keyed by blockstamp. Insert, increment and trigger
/// are atomic under one mutex; callbacks run outside it.
#[derive(Default)]
pub struct ConsensusBook {
    jobs: Mutex<HashMap<BlockStamp, Pending>>,
}

impl ConsensusBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, stamp: BlockStamp, poh: String, callback: QuorumCallback) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(
                stamp,
                Pending {
                    poh,
                    quorum: 0,
                    callback,
                },
            );
        }
    }

    pub fn pending(&self, stamp: BlockStamp) -> bool {
        self.jobs.lock().map(|j| j.contains_key(&stamp)).unwrap_or(false)
    }

    /// Counts one consent. The entry fires and disappears when the quorum
    /// target is reached; a consent with a foreign PoH never counts.
    pub fn increment(&self, stamp: BlockStamp, poh: &str, target: usize) -> bool {
        let callback = {
            let Ok(mut jobs) = self.jobs.lock() else {
                return false;
            };
            let Some(pending) = jobs.get_mut(&stamp) else {
                return false;
            };
            if pending.poh != poh {
                debug!(%stamp, "consent poh differs, not counted");
                return false;
            }
            pending.quorum += 1;
            if pending.quorum >= target {
                jobs.remove(&stamp).map(|p| p.callback)
            } else {
                None
            }
        };
        match callback {
            Some(callback) => {
                info!(%stamp, "consensus quorum reached");
                callback();
                true
            }
            None => false,
        }
    }
}

/// Asks the peer set to confirm a legit record's PoH, firing `callback`
/// when ⌈|peers|/2⌉ identical consents arrive.
pub async fn ratify(
    node: &Node,
    stamp: BlockStamp,
    callback: QuorumCallback,
) -> Result<(), NetworkError> {
    let record = node
        .store
        .find_record(stamp)?
        .filter(|r| r.legit == Some(true));
    let Some(record) = record else {
        return Err(NetworkError::NotRatifiable);
    };
    let Some(poh) = record.poh.clone() else {
        return Err(NetworkError::NotRatifiable);
    };

    node.consensus.open(stamp, poh, callback);
    let message = json!({
        "consensus": ConsensusMsg {
            origin: node.public_url.clone(),
            blockstamp: stamp,
            hash: record.seed(node.store.digest()),
            n: node.peers.len(),
            x: 0,
        }
    });
    node.send_message(message, Vec::new()).await;
    Ok(())
}

/// Answers (or forwards) a peer's consensus request.
pub async fn manage_consensus(node: &Node, msg: ConsensusMsg) -> Result<(), NetworkError> {
    match node.store.find_record(msg.blockstamp)? {
        Some(record) => {
            let previous = node
                .store
                .previous_legit_poh(record.family(), msg.blockstamp)?
                .unwrap_or_default();
            let poh = chain_poh(node.store.digest(), &previous, &msg.hash);
            let consent = json!({
                "consent": ConsentMsg {
                    blockstamp: msg.blockstamp,
                    poh,
                }
            });
            node.send_message(consent, vec![msg.origin.clone()]).await;
        }
        None => {
            // not synced to that height yet: pass the request along, within
            // the lifetime the origin pinned
            if msg.x >= msg.n {
                warn!(stamp = %msg.blockstamp, "consensus request expired unanswered");
                return Ok(());
            }
            let candidates: Vec<String> = node
                .peers
                .snapshot()
                .into_iter()
                .filter(|p| p != &msg.origin)
                .collect();
            let chosen = candidates.choose(&mut rand::thread_rng()).cloned();
            if let Some(peer) = chosen {
                let forwarded = json!({
                    "consensus": ConsensusMsg {
                        x: msg.x + 1,
                        ..msg.clone()
                    }
                });
                node.send_message(forwarded, vec![peer]).await;
            }
        }
    }
    Ok(())
}

/// Handles an inbound consent against the pending table.
pub fn manage_consent(node: &Node, msg: &ConsentMsg) -> bool {
    let target = node.peers.len().div_ceil(2).max(1);
    node.consensus.increment(msg.blockstamp, &msg.poh, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_callback(fired: &Arc<AtomicUsize>) -> QuorumCallback {
        let fired = Arc::clone(fired);
        Box::new(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn quorum_fires_exactly_once() {
        let book = ConsensusBook::new();
        let stamp = BlockStamp::new(10, 1);
        let fired = Arc::new(AtomicUsize::new(0));
        book.open(stamp, "abc".to_string(), counter_callback(&fired));

        // four peers: quorum target is two; one dissident answers wrong
        let target = 4usize.div_ceil(2);
        assert!(!book.increment(stamp, "abc", target));
        assert!(!book.increment(stamp, "zzz", target));
        assert!(book.increment(stamp, "abc", target));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // late consent after the quorum: entry is gone, nothing happens
        assert!(!book.increment(stamp, "abc", target));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!book.pending(stamp));
    }

    #[test]
    fn foreign_poh_never_counts() {
        let book = ConsensusBook::new();
        let stamp = BlockStamp::new(10, 1);
        let fired = Arc::new(AtomicUsize::new(0));
        book.open(stamp, "abc".to_string(), counter_callback(&fired));

        for _ in 0..10 {
            assert!(!book.increment(stamp, "wrong", 2));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(book.pending(stamp));
    }
}
