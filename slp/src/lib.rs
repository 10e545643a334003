//! Rust-native building blocks for the Side Ledger Protocol
//!
//! SLP is an expanding collection of modules that implements the Side
//! Ledger Protocol sidechain in native Rust: the smartbridge codec, the
//! journal and state stores, the contract engine and the gossip layer. The
//! `slp-node` crate wires them into a runnable indexer daemon; this crate
//! is the library facade for explorers, wallets and tooling.

#[doc(inline)]
pub use slp_codec as codec;

#[doc(inline)]
pub use slp_configs as configs;

#[doc(inline)]
pub use slp_crypto as crypto;

#[doc(inline)]
pub use slp_math as math;

pub mod ledger {
    //! Journal, token state and the rules that materialize records

    #[doc(inline)]
    pub use slp_applying as rules;

    #[doc(inline)]
    pub use slp_db as store;
}

#[doc(inline)]
pub use slp_chain as chain;

#[doc(inline)]
pub use slp_network as network;
