//! Contract engine: rules SLP records and materializes their effect
//!
//! Every freshly journalled record goes through [`apply`] exactly once. The
//! handler for its `(family, operation)` pair runs a pure check list over
//! the current state; when all checks pass, the state mutations land and
//! the record's `legit` flag flips to true. The first failing check becomes
//! the record's rejection cause, a copy goes to the rejected store, and
//! `legit` flips to false. Either way the flag settles exactly once: the
//! store's compare-and-set refuses replays, so delivery can be at-least-once
//! upstream while application stays at-most-once.

pub mod rejection;
pub mod slp1;
pub mod slp2;

pub use rejection::{Rejection, Slp1Error, Slp2Error};

use thiserror::Error;
use tracing::{debug, info, warn};

use slp_codec::Payload;
use slp_configs::NetworkConfig;
use slp_db::{BlockStamp, Store};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("record {0} not found in journal")]
    RecordNotFound(BlockStamp),

    #[error("storage failure")]
    Store(#[from] slp_db::kvtable::Error),

    #[error("configuration failure")]
    Config(#[from] slp_configs::ConfigError),

    #[error("quantity arithmetic failure")]
    Math(#[from] slp_math::DecimalError),

    #[error("codec failure")]
    Codec(#[from] slp_codec::CodecError),
}

/// Everything a handler may read or mutate.
pub struct Context<'a> {
    pub store: &'a Store,
    pub config: &'a NetworkConfig,
}

/// The engine's ruling on one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Applied,
    Rejected(Rejection),
    /// The record was already settled; replaying is a no-op.
    Skipped,
}

/// Rules the record at `stamp` and settles its `legit` flag.
pub fn apply(ctx: &Context, stamp: BlockStamp) -> Result<Verdict, EngineError> {
    let record = ctx
        .store
        .find_record(stamp)?
        .ok_or(EngineError::RecordNotFound(stamp))?;

    if record.legit.is_some() {
        debug!(%stamp, "record already settled, skipping");
        return Ok(Verdict::Skipped);
    }

    let verdict = match &record.op {
        Payload::Slp1(op) => slp1::apply(ctx, &record, op)?,
        Payload::Slp2(op) => slp2::apply(ctx, &record, op)?,
    };

    match &verdict {
        Ok(()) => {
            ctx.store.set_legit(stamp, true)?;
            info!(%stamp, op = record.op_name(), token = record.token_id(), "record applied");
            Ok(Verdict::Applied)
        }
        Err(rejection) => {
            let comment = rejection.to_string();
            warn!(%stamp, op = record.op_name(), %comment, "record rejected");
            ctx.store.reject(&record, &comment)?;
            ctx.store.set_legit(stamp, false)?;
            Ok(Verdict::Rejected(rejection.clone()))
        }
    }
}

/// Check-list outcome used inside handlers: pass, or the first failure.
pub(crate) type Checked = Result<(), Rejection>;

/// First-failure check: turns a false condition into the handler's verdict.
macro_rules! ensure {
    ($cond:expr, $rejection:expr) => {
        if !($cond) {
            return Ok(Err($rejection.into()));
        }
    };
}

pub(crate) use ensure;
