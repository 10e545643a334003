//! Node-to-node layer
//!
//! Peers exchange three JSON message kinds over plain HTTP: `hello`
//! (discovery), `consensus` (a request to cross-check one record's
//! proof-of-history) and `consent` (the signed answer). Inbound traffic
//! lands on the [`http`] surface, is deduplicated by the [`messenger`]
//! memory and dispatched by the messenger worker; outbound fan-out goes
//! through the single [`broadcast`] worker so callers never block on the
//! network.

pub mod broadcast;
pub mod consensus;
pub mod http;
pub mod messenger;
pub mod node;
pub mod peers;

pub use node::{GossipClient, Node};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("peer request failed")]
    Http(#[from] reqwest::Error),

    #[error("storage failure")]
    Store(#[from] slp_db::kvtable::Error),

    #[error("configuration failure")]
    Config(#[from] slp_configs::ConfigError),

    #[error("record is not ratifiable")]
    NotRatifiable,
}
