//! Smartbridge codec for the Side Ledger Protocol
//!
//! Contract payloads travel in the free-form vendor field of base-layer
//! transfers as strings shaped `_slpN://<hex fixed header><varia>`, capped
//! at 256 bytes. The fixed header layout is selected by the network
//! milestones ([`formats`]), the variable tail is a run of length-prefixed
//! UTF-8 strings ([`varia`]), and [`bridge`] ties both together behind
//! pack/unpack entry points. Operations decode into the closed
//! [`ops::Payload`] model.

pub mod bridge;
pub mod formats;
pub mod ops;
pub mod varia;

pub use bridge::{pack, unpack, MAX_LEN};
pub use ops::{Family, Payload, Slp1Op, Slp2Op};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("not a valid smartbridge")]
    InvalidSmartbridge,

    #[error("smartbridge exceeds {MAX_LEN} bytes")]
    OverLength,

    #[error("unknown slp type '{0}'")]
    UnknownSlpType(String),

    #[error("unknown operation code {0:#04x}")]
    UnknownOperation(u8),

    #[error("operation '{0}' is not in the milestone input types")]
    UnsupportedOperation(&'static str),

    #[error("unsupported format atom '{0}'")]
    UnknownAtom(String),

    #[error("fixed header truncated")]
    HeaderOverrun,

    #[error("varia length prefix overruns payload")]
    VariaOverrun,

    #[error("variable string exceeds 255 bytes")]
    VariaTooLong,

    #[error("field '{0}' has an invalid value")]
    InvalidField(&'static str),

    #[error("error resolving milestone parameters")]
    Config(#[from] slp_configs::ConfigError),

    #[error("error reading quantity")]
    Decimal(#[from] slp_math::DecimalError),
}
