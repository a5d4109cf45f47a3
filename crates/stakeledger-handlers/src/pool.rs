//! What handlers may ask of the transaction pool.

use stakeledger_core::{PublicKey, Transaction, TransactionKey};
use thiserror::Error;

/// Read-only view of pending transactions.
pub trait PoolView: Send + Sync {
    /// Pending transactions of one type, in admission order.
    fn pending_by_type(&self, key: TransactionKey) -> Vec<&Transaction>;

    fn has_pending_from(&self, key: TransactionKey, sender: &PublicKey) -> bool {
        self.pending_by_type(key)
            .iter()
            .any(|tx| tx.sender() == sender)
    }
}

/// A pool-only admission refusal. Never affects the block path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolRejection {
    #[error("sender already has a pending {0} transaction")]
    Pending(TransactionKey),

    #[error("conflicts with a pending transaction: {0}")]
    Conflict(String),
}

impl PoolRejection {
    /// Stable error code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            PoolRejection::Pending(_) => "ERR_PENDING",
            PoolRejection::Conflict(_) => "ERR_CONFLICT",
        }
    }
}

/// Admission policy shared by types that allow one pending transaction per
/// sender.
pub fn one_per_sender(tx: &Transaction, pool: &dyn PoolView) -> Result<(), PoolRejection> {
    if pool.has_pending_from(tx.key(), tx.sender()) {
        return Err(PoolRejection::Pending(tx.key()));
    }
    Ok(())
}
