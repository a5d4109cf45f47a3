//! Error types for transaction handlers.

use stakeledger_core::{TransactionKey, ValidationError};
use stakeledger_store::StoreError;
use thiserror::Error;

/// Errors from handler dispatch, application and bootstrap.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// State that validation should have ruled out reached apply or revert.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("no handler registered for {0}")]
    UnknownType(TransactionKey),

    #[error("handler already registered for {0}")]
    DuplicateHandler(TransactionKey),
}

impl HandlerError {
    /// Build an invariant violation, logging it before it propagates.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "ledger invariant violated");
        HandlerError::InvariantViolation(message)
    }
}

/// Result type for handler operations.
pub type Result<T> = std::result::Result<T, HandlerError>;
