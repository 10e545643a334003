//! Rejection causes per family
//!
//! A handler walks its check list and stops at the first failure; the
//! rendered message becomes the `comment` stored beside the rejected
//! record. Messages name the offending wallet or token so operators can
//! read the rejected store without replaying anything.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error(transparent)]
    Slp1(#[from] Slp1Error),

    #[error(transparent)]
    Slp2(#[from] Slp2Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Slp1Error {
    #[error("{0} quantity should avoid decimal part")]
    QuantityNotIntegral(&'static str),

    #[error("blockchain transaction amount has to match {0} cost")]
    CostBelowFee(&'static str),

    #[error("{0} contract has to be sent to master address")]
    NotMasterAddress(&'static str),

    #[error("token {0} does not exist")]
    TokenNotFound(String),

    #[error("token {0} paused by owner")]
    TokenPaused(String),

    #[error("token {0} already paused by owner")]
    AlreadyPaused(String),

    #[error("token {0} already resumed by owner")]
    NotPaused(String),

    #[error("{0} token is not mintable")]
    NotMintable(String),

    #[error("{0} token is not pausable")]
    NotPausable(String),

    #[error("wallet {0} does not exist")]
    WalletNotFound(String),

    #[error("wallet {0} is not the owner")]
    NotOwner(String),

    #[error("wallet {0} frozen by owner")]
    Frozen(String),

    #[error("wallet {0} already frozen by owner")]
    AlreadyFrozen(String),

    #[error("wallet {0} not frozen by owner")]
    NotFrozen(String),

    #[error("invalid blockstamp {0} (too low)")]
    StampTooLow(String),

    #[error("burn quantity greater than wallet balance")]
    BurnExceedsBalance,

    #[error("wallet {0} balance is insufficient")]
    InsufficientBalance(String),

    #[error("mint quantity overflows allowed supply")]
    SupplyOverflow,

    #[error("token exchange could not be completed")]
    ExchangeFailed,

    #[error("token id already registered")]
    TokenIdCollision,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Slp2Error {
    #[error("blockchain transaction amount has to match {0} cost")]
    CostBelowFee(&'static str),

    #[error("{0} contract has to be sent to master address")]
    NotMasterAddress(&'static str),

    #[error("token {0} does not exist")]
    TokenNotFound(String),

    #[error("token {0} paused by owner")]
    TokenPaused(String),

    #[error("token {0} already paused by owner")]
    AlreadyPaused(String),

    #[error("token {0} already resumed by owner")]
    NotPaused(String),

    #[error("{0} token is not pausable")]
    NotPausable(String),

    #[error("token {0} genesis record not found")]
    GenesisNotFound(String),

    #[error("wallet {0} does not exist")]
    WalletNotFound(String),

    #[error("wallet {0} is not the owner")]
    NotOwner(String),

    #[error("wallet {0} already authorized")]
    AlreadyAuthorized(String),

    #[error("wallet {0} already unauthorized")]
    AlreadyRevoked(String),

    #[error("invalid blockstamp {0} (too low)")]
    StampTooLow(String),

    #[error("metadata should be a dictionary instance")]
    MetadataNotDict,

    #[error("blockchain transaction {0} not found")]
    ReferenceNotFound(String),

    #[error("token id already registered")]
    TokenIdCollision,
}
