//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use stakeledger_core::{Address, Block, BlockHeader, ExpirationRecord, TransactionKey};

use crate::error::{Result, StoreError};
use crate::traits::{BlockWriter, ChainTip, ExpirationStore, TransactionHistory, TransactionRecord};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Block headers by height.
    blocks: BTreeMap<u64, BlockHeader>,

    /// Transactions keyed by chain position.
    transactions: BTreeMap<(u64, u32), TransactionRecord>,

    /// Pending expirations, in sweep order.
    expirations: BTreeSet<ExpirationRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Number of pending expiration records.
    pub fn expiration_count(&self) -> Result<usize> {
        Ok(self.read()?.expirations.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionHistory for MemoryStore {
    async fn find_all_by_type(&self, key: TransactionKey) -> Result<Vec<TransactionRecord>> {
        let inner = self.read()?;
        Ok(inner
            .transactions
            .values()
            .filter(|r| r.transaction.key() == key)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExpirationStore for MemoryStore {
    async fn find_one(
        &self,
        address: &Address,
        stake_key: i64,
        redeemable_timestamp: i64,
    ) -> Result<Option<ExpirationRecord>> {
        let probe = ExpirationRecord {
            redeemable_timestamp,
            address: *address,
            stake_key,
        };
        Ok(self.read()?.expirations.get(&probe).cloned())
    }

    async fn find_and_count(&self, before: i64) -> Result<(Vec<ExpirationRecord>, usize)> {
        let inner = self.read()?;
        let due: Vec<ExpirationRecord> = inner
            .expirations
            .iter()
            .take_while(|r| r.redeemable_timestamp < before)
            .cloned()
            .collect();
        let count = due.len();
        Ok((due, count))
    }

    async fn save(&self, record: &ExpirationRecord) -> Result<()> {
        self.write()?.expirations.insert(record.clone());
        Ok(())
    }

    async fn remove(&self, record: &ExpirationRecord) -> Result<bool> {
        Ok(self.write()?.expirations.remove(record))
    }
}

#[async_trait]
impl ChainTip for MemoryStore {
    async fn last_block(&self) -> Result<Option<BlockHeader>> {
        Ok(self.read()?.blocks.values().next_back().copied())
    }

    async fn header_at(&self, height: u64) -> Result<Option<BlockHeader>> {
        Ok(self.read()?.blocks.get(&height).copied())
    }
}

#[async_trait]
impl BlockWriter for MemoryStore {
    async fn save_block(&self, block: &Block) -> Result<()> {
        let mut inner = self.write()?;
        let tip = inner.blocks.keys().next_back().copied();
        let expected = tip.map_or(block.height(), |h| h + 1);
        if block.height() != expected {
            return Err(StoreError::NotTip {
                height: block.height(),
                tip,
            });
        }

        inner.blocks.insert(block.height(), block.header);
        for (sequence, tx) in block.transactions.iter().enumerate() {
            let sequence = sequence as u32;
            inner.transactions.insert(
                (block.height(), sequence),
                TransactionRecord {
                    block_height: block.height(),
                    block_timestamp: block.timestamp(),
                    sequence,
                    transaction: tx.clone(),
                },
            );
        }
        Ok(())
    }

    async fn delete_block(&self, header: &BlockHeader) -> Result<()> {
        let mut inner = self.write()?;
        let tip = inner.blocks.keys().next_back().copied();
        if tip != Some(header.height) {
            return Err(StoreError::NotTip {
                height: header.height,
                tip,
            });
        }
        inner.blocks.remove(&header.height);
        inner
            .transactions
            .retain(|(height, _), _| *height != header.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakeledger_core::{Keypair, TransactionBuilder};

    fn record(ts: i64, addr: u8, key: i64) -> ExpirationRecord {
        ExpirationRecord {
            redeemable_timestamp: ts,
            address: Address::from_bytes([addr; 20]),
            stake_key: key,
        }
    }

    #[tokio::test]
    async fn test_find_and_count_is_strict_and_ordered() {
        let store = MemoryStore::new();
        store.save(&record(300, 1, 1)).await.unwrap();
        store.save(&record(100, 2, 2)).await.unwrap();
        store.save(&record(200, 1, 3)).await.unwrap();

        let (due, count) = store.find_and_count(300).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(due, vec![record(100, 2, 2), record(200, 1, 3)]);
    }

    #[tokio::test]
    async fn test_register_skips_existing() {
        let store = MemoryStore::new();
        assert!(store.register(&record(10, 1, 1)).await.unwrap());
        assert!(!store.register(&record(10, 1, 1)).await.unwrap());
        assert_eq!(store.expiration_count().unwrap(), 1);

        assert!(store.remove(&record(10, 1, 1)).await.unwrap());
        assert!(!store.remove(&record(10, 1, 1)).await.unwrap());
        assert!(store
            .find_one(&Address::from_bytes([1; 20]), 1, 10)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_blocks_drive_history_and_tip() {
        let store = MemoryStore::new();
        let kp = Keypair::from_seed(&[1; 32]);
        let to = Address::from_bytes([2; 20]);

        let genesis = Block::new(1, 0, None, vec![TransactionBuilder::transfer(to, 5).sign(&kp)]);
        let second = Block::new(
            2,
            8,
            Some(genesis.header.id),
            vec![
                TransactionBuilder::transfer(to, 6).sign(&kp),
                TransactionBuilder::stake_redeem(1).sign(&kp),
            ],
        );
        store.save_block(&genesis).await.unwrap();
        store.save_block(&second).await.unwrap();

        assert_eq!(store.last_block().await.unwrap(), Some(second.header));
        let transfers = store
            .find_all_by_type(TransactionKey::TRANSFER)
            .await
            .unwrap();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].block_height, 1);
        assert_eq!(transfers[1].block_timestamp, 8);

        assert!(matches!(
            store.save_block(&genesis).await,
            Err(StoreError::NotTip { .. })
        ));

        assert_eq!(store.header_at(1).await.unwrap(), Some(genesis.header));

        store.delete_block(&second.header).await.unwrap();
        assert_eq!(store.last_block().await.unwrap(), Some(genesis.header));
        assert_eq!(store.header_at(2).await.unwrap(), None);
        assert_eq!(
            store
                .find_all_by_type(TransactionKey::STAKE_REDEEM)
                .await
                .unwrap()
                .len(),
            0
        );
    }
}
