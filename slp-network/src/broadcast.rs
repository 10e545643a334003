//! Outbound fan-out worker
//!
//! One task drains the broadcast queue and issues the POSTs, so the
//! messenger, the consensus table and the HTTP handlers never wait on a
//! slow peer.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::node::Node;

pub struct BroadcastJob {
    pub endpoint: &'static str,
    pub message: Value,
    /// Explicit recipients; empty means every known peer.
    pub peers: Vec<String>,
}

/// Worker loop; exits when every sender is gone.
pub async fn run(node: Arc<Node>, mut rx: mpsc::Receiver<BroadcastJob>) {
    while let Some(job) = rx.recv().await {
        let targets = if job.peers.is_empty() {
            node.peers.snapshot()
        } else {
            job.peers
        };
        for peer in targets {
            if let Err(e) = node.gossip.post(&peer, job.endpoint, &job.message).await {
                debug!(%peer, endpoint = job.endpoint, reason = %e, "broadcast delivery failed");
            }
        }
    }
    info!("broadcaster clean exit");
}
