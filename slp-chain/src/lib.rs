//! Block intake pipeline
//!
//! Two sources feed the single block queue: the base-layer webhook (live
//! blocks, once synced) and the back-fill [`sync::Processor`] (historical
//! pages). The [`parser::BlockParser`] drains the queue one block at a time,
//! extracts SLP vendor fields, journals the resulting records and runs the
//! contract engine over them in transaction order.

pub mod client;
pub mod mark;
pub mod parser;
pub mod sync;
pub mod validate;
pub mod webhook;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("base layer request failed")]
    Http(#[from] reqwest::Error),

    #[error("base layer answered with status {0}")]
    BadStatus(u16),

    #[error("block integrity breach: transaction count mismatch")]
    IntegrityBreach,

    #[error("file IO error")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error")]
    Json(#[from] serde_json::Error),

    #[error("webhook token is missing or malformed")]
    WebhookToken,

    #[error("configuration failure")]
    Config(#[from] slp_configs::ConfigError),

    #[error("storage failure")]
    Store(#[from] slp_db::kvtable::Error),

    #[error("engine failure")]
    Engine(#[from] slp_applying::EngineError),
}
