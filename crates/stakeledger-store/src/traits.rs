//! Collaborator traits: the persistence the ledger consumes.
//!
//! The ledger never talks to a database directly. It reads transaction
//! history during bootstrap, reads and deletes expiration records during a
//! sweep, and asks for the chain tip. Implementations include SQLite
//! (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use stakeledger_core::{Address, Block, BlockHeader, ExpirationRecord, Transaction, TransactionKey};

use crate::error::Result;

/// A persisted transaction and its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub block_height: u64,
    pub block_timestamp: i64,
    /// Index within the block.
    pub sequence: u32,
    pub transaction: Transaction,
}

/// Read access to confirmed transaction history.
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    /// All confirmed transactions of one type, in chain order
    /// (block height, then sequence within the block).
    async fn find_all_by_type(&self, key: TransactionKey) -> Result<Vec<TransactionRecord>>;
}

/// Durable index of stakes awaiting their halving.
#[async_trait]
pub trait ExpirationStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Look up one record by its full key.
    async fn find_one(
        &self,
        address: &Address,
        stake_key: i64,
        redeemable_timestamp: i64,
    ) -> Result<Option<ExpirationRecord>>;

    /// Records with `redeemable_timestamp < before`, with their count.
    ///
    /// Records are ordered by (redeemable_timestamp, address, stake_key).
    async fn find_and_count(&self, before: i64) -> Result<(Vec<ExpirationRecord>, usize)>;

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a record. Inserting an existing record is a no-op.
    async fn save(&self, record: &ExpirationRecord) -> Result<()>;

    /// Delete a record.
    ///
    /// # Returns
    ///
    /// Whether the record existed.
    async fn remove(&self, record: &ExpirationRecord) -> Result<bool>;

    /// Insert `record` unless one with the same key already exists.
    ///
    /// # Returns
    ///
    /// Whether a record was written.
    async fn register(&self, record: &ExpirationRecord) -> Result<bool> {
        let existing = self
            .find_one(&record.address, record.stake_key, record.redeemable_timestamp)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }
        self.save(record).await?;
        Ok(true)
    }
}

/// Access to confirmed block headers.
#[async_trait]
pub trait ChainTip: Send + Sync {
    async fn last_block(&self) -> Result<Option<BlockHeader>>;

    /// The confirmed header at `height`, if any.
    async fn header_at(&self, height: u64) -> Result<Option<BlockHeader>>;
}

/// Persists blocks so history and tip stay in step with the ledger.
///
/// Used by the embedding node and by tests; the ledger itself only reads.
#[async_trait]
pub trait BlockWriter: Send + Sync {
    /// Append a block on top of the current tip.
    async fn save_block(&self, block: &Block) -> Result<()>;

    /// Remove the tip block and its transactions.
    async fn delete_block(&self, header: &BlockHeader) -> Result<()>;
}

/// Everything the ledger needs from persistence.
pub trait LedgerStore: TransactionHistory + ExpirationStore + ChainTip {}

impl<T: TransactionHistory + ExpirationStore + ChainTip + ?Sized> LedgerStore for T {}

// ─────────────────────────────────────────────────────────────────────────────
// Shared stores
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl<T: TransactionHistory + ?Sized> TransactionHistory for Arc<T> {
    async fn find_all_by_type(&self, key: TransactionKey) -> Result<Vec<TransactionRecord>> {
        (**self).find_all_by_type(key).await
    }
}

#[async_trait]
impl<T: ExpirationStore + ?Sized> ExpirationStore for Arc<T> {
    async fn find_one(
        &self,
        address: &Address,
        stake_key: i64,
        redeemable_timestamp: i64,
    ) -> Result<Option<ExpirationRecord>> {
        (**self).find_one(address, stake_key, redeemable_timestamp).await
    }

    async fn find_and_count(&self, before: i64) -> Result<(Vec<ExpirationRecord>, usize)> {
        (**self).find_and_count(before).await
    }

    async fn save(&self, record: &ExpirationRecord) -> Result<()> {
        (**self).save(record).await
    }

    async fn remove(&self, record: &ExpirationRecord) -> Result<bool> {
        (**self).remove(record).await
    }
}

#[async_trait]
impl<T: ChainTip + ?Sized> ChainTip for Arc<T> {
    async fn last_block(&self) -> Result<Option<BlockHeader>> {
        (**self).last_block().await
    }

    async fn header_at(&self, height: u64) -> Result<Option<BlockHeader>> {
        (**self).header_at(height).await
    }
}

#[async_trait]
impl<T: BlockWriter + ?Sized> BlockWriter for Arc<T> {
    async fn save_block(&self, block: &Block) -> Result<()> {
        (**self).save_block(block).await
    }

    async fn delete_block(&self, header: &BlockHeader) -> Result<()> {
        (**self).delete_block(header).await
    }
}
