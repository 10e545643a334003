//! Network configuration for SLP nodes
//!
//! A network is described by two JSON documents: `{network}.json` with the
//! node-level settings (peers, database name, master address...) and
//! `milestones.json` with height-activated protocol parameters (costs,
//! field sets, wire formats, input types). Lookups go through
//! [`NetworkConfig::ask`], which overlays milestones in activation order.

pub mod network;

pub use network::{ConfigError, Milestone, NetworkConfig};
