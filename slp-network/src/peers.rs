//! Peer discovery
//!
//! A `hello` names one peer; prospection walks outward from it, asking each
//! newcomer for its own peer list, answering with our URL when the link is
//! one-sided, and stopping as soon as the registry is over its bound.

use std::collections::{HashSet, VecDeque};

use serde_json::json;
use tracing::{debug, info};

use crate::node::Node;

pub fn hello_message(peer: &str) -> serde_json::Value {
    json!({"hello": {"peer": peer}})
}

pub async fn manage_hello(node: &Node, peer: &str) {
    prospect(node, vec![peer.to_string()]).await;
    info!(count = node.peers.len(), "discovered peers");
}

/// Bounded breadth-first prospection from a seed list.
pub async fn prospect(node: &Node, seeds: Vec<String>) {
    let me = node.public_url.clone();
    let mut queue: VecDeque<String> = seeds.into_iter().collect();
    let mut visited: HashSet<String> = HashSet::new();

    while let Some(peer) = queue.pop_front() {
        if node.peers.over_limit() {
            debug!("peer limit reached, prospection stopped");
            return;
        }
        if peer == me || node.peers.contains(&peer) || !visited.insert(peer.clone()) {
            continue;
        }

        let Ok(listed) = node.gossip.get_peers(&peer).await else {
            continue;
        };
        node.peers.insert(peer.clone());

        let theirs: HashSet<String> = listed.into_iter().collect();
        // the peer misses someone we know: say hello so the link becomes
        // bidirectional
        let known: HashSet<String> = node.peers.snapshot().into_iter().collect();
        if known.difference(&theirs).next().is_some() {
            let _ = node.gossip.post_message(&peer, &hello_message(&me)).await;
        }

        for candidate in theirs {
            if !node.peers.contains(&candidate) {
                queue.push_back(candidate);
            }
        }
    }
}
