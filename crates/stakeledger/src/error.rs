//! Error types for the ledger.

use stakeledger_core::{CoreError, PublicKey, TransactionId, ValidationError};
use stakeledger_handlers::{HandlerError, PoolRejection};
use stakeledger_store::StoreError;
use thiserror::Error;

/// Errors from block application, reversal and bootstrap.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A transaction in the block failed validation. The block was rolled
    /// back.
    #[error("transaction {id} rejected: {reason}")]
    Rejected {
        id: TransactionId,
        reason: ValidationError,
    },

    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Core(#[from] CoreError),

    /// The block does not extend the current tip.
    #[error("block {height} does not extend tip {tip:?}")]
    NotOnTip { height: u64, tip: Option<u64> },

    /// No retained history to step back to.
    #[error("cannot revert beyond {max_depth} blocks")]
    ReorgTooDeep { max_depth: usize },

    /// Replayed history produced an impossible state.
    #[error("corrupt state: {0}")]
    CorruptState(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Why the pool refused a transaction.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("sender {0} has too many rejected transactions")]
    Banned(PublicKey),

    #[error("transaction {0} is already pending")]
    Duplicate(TransactionId),

    #[error("pool is full")]
    Full,

    #[error("invalid transaction: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Rejected(#[from] PoolRejection),

    #[error("handler error: {0}")]
    Handler(#[from] HandlerError),
}

impl PoolError {
    /// Stable error code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::Banned(_) => "ERR_BANNED",
            PoolError::Duplicate(_) => "ERR_DUPLICATE",
            PoolError::Full => "ERR_POOL_FULL",
            PoolError::Invalid(_) => "ERR_INVALID",
            PoolError::Rejected(rejection) => rejection.code(),
            PoolError::Handler(_) => "ERR_APPLY",
        }
    }
}
