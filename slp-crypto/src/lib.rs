//! Digest primitives for the SLP sidechain
//!
//! Two digests appear in the protocol and they are not interchangeable:
//!
//! * the proof-of-history chain and webhook token checks use a digest fixed
//!   per network ([`Digest`], normally SHA-256),
//! * token identifiers are always the MD5 of the genesis coordinates, since
//!   the wire format reserves exactly 16 bytes (32 hex chars) for ids.

pub mod hash;

pub use hash::{canonical_json, chain_poh, md5_hex, seed_hex, sha256_hex, token_id, Digest};
