//! The node value: every piece of shared gossip state in one place

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use slp_chain::client::Block;
use slp_configs::NetworkConfig;
use slp_db::Store;

use crate::broadcast::BroadcastJob;
use crate::consensus::ConsensusBook;
use crate::NetworkError;

/// Bounded set of known peer URLs. The bound keeps recursive prospection
/// from flooding the node with its own discovery traffic.
pub struct PeerBook {
    peers: Mutex<HashSet<String>>,
    limit: usize,
}

impl PeerBook {
    pub fn new(limit: usize) -> Self {
        Self {
            peers: Mutex::new(HashSet::new()),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn over_limit(&self) -> bool {
        self.len() > self.limit
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.peers.lock().map(|p| p.contains(peer)).unwrap_or(false)
    }

    pub fn insert(&self, peer: String) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.insert(peer);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.peers
            .lock()
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Plain JSON-over-HTTP client used for peer traffic.
#[derive(Clone)]
pub struct GossipClient {
    http: reqwest::Client,
}

impl GossipClient {
    pub fn new() -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    pub async fn post(
        &self,
        peer: &str,
        endpoint: &str,
        message: &Value,
    ) -> Result<(), NetworkError> {
        let url = format!("{peer}{endpoint}");
        self.http.post(&url).json(message).send().await?;
        Ok(())
    }

    pub async fn post_message(&self, peer: &str, message: &Value) -> Result<(), NetworkError> {
        self.post(peer, "/message", message).await
    }

    pub async fn get_peers(&self, peer: &str) -> Result<Vec<String>, NetworkError> {
        let url = format!("{peer}/peers");
        let listed = self.http.get(&url).send().await?.json().await?;
        Ok(listed)
    }
}

/// Shared state of the gossip layer, owned once and passed by `Arc` into
/// workers and HTTP handlers.
pub struct Node {
    pub store: Store,
    pub config: NetworkConfig,
    /// This node's own `http://ip:port` base URL, as peers reach it.
    pub public_url: String,
    pub data_dir: PathBuf,
    pub peers: PeerBook,
    pub consensus: ConsensusBook,
    pub gossip: GossipClient,
    pub broadcast_tx: mpsc::Sender<BroadcastJob>,
    pub block_tx: mpsc::Sender<Block>,
    /// Back-fill finished; webhook blocks may flow.
    pub synced: Arc<AtomicBool>,
}

impl Node {
    /// Queues an outbound `/message` fan-out; empty `peers` means everyone
    /// currently known.
    pub async fn send_message(&self, message: Value, peers: Vec<String>) {
        let job = BroadcastJob {
            endpoint: "/message",
            message,
            peers,
        };
        if self.broadcast_tx.send(job).await.is_err() {
            debug!("broadcaster is gone, message dropped");
        }
    }
}
