//! Inbound message worker and dedup memory
//!
//! HTTP handlers push every inbound payload through [`MessengerHandle::put`],
//! which drops anything already seen lately, then the single messenger task
//! dispatches: webhook blocks to the parser queue (once the back-fill is
//! done), `hello` to peer prospection, `consensus` and `consent` to the
//! consensus table.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use slp_chain::parser::block_from_webhook;
use slp_chain::webhook::check_webhook_token;
use slp_crypto::md5_hex;

use crate::consensus::{manage_consensus, manage_consent, ConsensusMsg, ConsentMsg};
use crate::node::Node;
use crate::peers;

/// One inbound payload, already parsed.
#[derive(Debug)]
pub enum Inbound {
    /// Webhook delivery: `Authorization` header plus the raw body.
    Block { authorization: String, body: Value },
    /// Peer gossip message.
    Gossip(Value),
}

impl Inbound {
    /// Dedup is keyed on the payload body, not the envelope.
    fn dedup_key(&self) -> String {
        let body = match self {
            Inbound::Block { body, .. } => body,
            Inbound::Gossip(body) => body,
        };
        md5_hex(body.to_string().as_bytes())
    }
}

/// Bounded memory of recently seen payload hashes; evicts oldest first.
pub struct Memory {
    seen: VecDeque<String>,
    capacity: usize,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns false when the hash was already memorized.
    pub fn memorize(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen.len() >= self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back(key);
        true
    }
}

/// Enqueue side of the messenger, shared with the HTTP handlers.
#[derive(Clone)]
pub struct MessengerHandle {
    tx: mpsc::Sender<Inbound>,
    memory: Arc<Mutex<Memory>>,
}

impl MessengerHandle {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                tx,
                memory: Arc::new(Mutex::new(Memory::new(capacity))),
            },
            rx,
        )
    }

    /// Queues a payload unless the memory has seen it lately. Returns
    /// whether it was queued.
    pub fn put(&self, inbound: Inbound) -> bool {
        let key = inbound.dedup_key();
        let fresh = self
            .memory
            .lock()
            .map(|mut m| m.memorize(key))
            .unwrap_or(false);
        if !fresh {
            return false;
        }
        self.tx.try_send(inbound).is_ok()
    }
}

/// Messenger worker; exits when the handle is dropped.
pub async fn run(node: Arc<Node>, mut rx: mpsc::Receiver<Inbound>) {
    while let Some(inbound) = rx.recv().await {
        match inbound {
            Inbound::Block {
                authorization,
                body,
            } => manage_block(&node, &authorization, &body).await,
            Inbound::Gossip(message) => manage_gossip(&node, &message).await,
        }
    }
    info!("messenger clean exit");
}

async fn manage_block(node: &Node, authorization: &str, body: &Value) {
    if !node.synced.load(Ordering::Relaxed) {
        info!("waiting for blockchain sync, webhook request dropped");
        return;
    }
    if !check_webhook_token(&node.data_dir, authorization) {
        warn!("webhook auth failed");
        return;
    }
    let blocktime = match node.config.blocktime() {
        Ok(blocktime) => blocktime,
        Err(e) => {
            error!(reason = %e, "blocktime unavailable");
            return;
        }
    };
    match block_from_webhook(body, blocktime) {
        Some(block) => {
            info!(height = block.height, "genuine block header received");
            if node.block_tx.send(block).await.is_err() {
                error!("block parser is gone, webhook block dropped");
            }
        }
        None => warn!("malformed webhook body"),
    }
}

async fn manage_gossip(node: &Node, message: &Value) {
    if let Some(hello) = message.get("hello") {
        if let Some(peer) = hello.get("peer").and_then(Value::as_str) {
            peers::manage_hello(node, peer).await;
        }
        return;
    }
    if let Some(consensus) = message.get("consensus") {
        match serde_json::from_value::<ConsensusMsg>(consensus.clone()) {
            Ok(msg) => {
                if let Err(e) = manage_consensus(node, msg).await {
                    error!(reason = %e, "consensus handling failed");
                }
            }
            Err(e) => warn!(reason = %e, "malformed consensus message"),
        }
        return;
    }
    if let Some(consent) = message.get("consent") {
        match serde_json::from_value::<ConsentMsg>(consent.clone()) {
            Ok(msg) => {
                manage_consent(node, &msg);
            }
            Err(e) => warn!(reason = %e, "malformed consent message"),
        }
        return;
    }
    warn!("unhandled message shape");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_refuses_doubles_and_evicts_oldest() {
        let mut memory = Memory::new(2);
        assert!(memory.memorize("a".to_string()));
        assert!(!memory.memorize("a".to_string()));
        assert!(memory.memorize("b".to_string()));
        // capacity 2: inserting c evicts a
        assert!(memory.memorize("c".to_string()));
        assert!(memory.memorize("a".to_string()));
    }
}
