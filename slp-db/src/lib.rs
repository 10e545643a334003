//! Persistent state for an SLP node
//!
//! Five document collections back the indexer: the append-only `journal`
//! (keyed by height and transaction index), derived `contracts`, per-token
//! `slp1` and `slp2` wallets, and the `rejected` copy of refused records.
//! All of them live in one RocksDB instance behind typed key/value tables.
//!
//! The journal owns the proof-of-history chain: a record receives its `poh`
//! at the moment it is ruled legit, chaining from the previous legit record
//! of the same family.

pub mod kvtable;
pub mod model;
pub mod store;

pub use model::{BlockStamp, Contract, Record, RejectedRecord, Slp1Wallet, Slp2Wallet, TokenSupply};
pub use store::Store;
