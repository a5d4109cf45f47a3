//! Fault injection for store-dependent tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use stakeledger_core::{Address, Block, BlockHeader, ExpirationRecord, TransactionKey};
use stakeledger_store::{
    BlockWriter, ChainTip, ExpirationStore, Result, StoreError, TransactionHistory,
    TransactionRecord,
};

/// Wraps a store and fails expiration writes or queries on demand.
///
/// Everything else passes through untouched.
pub struct FlakyStore<S> {
    inner: S,
    /// Writes left before failing; negative means never fail.
    writes_left: AtomicI64,
    fail_queries: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes_left: AtomicI64::new(-1),
            fail_queries: AtomicBool::new(false),
        }
    }

    /// Let `n` more expiration writes through, then fail every one after.
    pub fn fail_writes_after(&self, n: i64) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    /// Fail expiration lookups, which makes sweeps fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Stop injecting faults.
    pub fn heal(&self) {
        self.writes_left.store(-1, Ordering::SeqCst);
        self.fail_queries.store(false, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_write(&self) -> Result<()> {
        let allowed = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                n if n < 0 => Some(n),
                n => Some(n - 1),
            });
        match allowed {
            Ok(_) => Ok(()),
            Err(_) => Err(StoreError::Unavailable("injected write failure".into())),
        }
    }

    fn check_query(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected query failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: TransactionHistory> TransactionHistory for FlakyStore<S> {
    async fn find_all_by_type(&self, key: TransactionKey) -> Result<Vec<TransactionRecord>> {
        self.inner.find_all_by_type(key).await
    }
}

#[async_trait]
impl<S: ExpirationStore> ExpirationStore for FlakyStore<S> {
    async fn find_one(
        &self,
        address: &Address,
        stake_key: i64,
        redeemable_timestamp: i64,
    ) -> Result<Option<ExpirationRecord>> {
        self.check_query()?;
        self.inner.find_one(address, stake_key, redeemable_timestamp).await
    }

    async fn find_and_count(&self, before: i64) -> Result<(Vec<ExpirationRecord>, usize)> {
        self.check_query()?;
        self.inner.find_and_count(before).await
    }

    async fn save(&self, record: &ExpirationRecord) -> Result<()> {
        self.check_write()?;
        self.inner.save(record).await
    }

    async fn remove(&self, record: &ExpirationRecord) -> Result<bool> {
        self.check_write()?;
        self.inner.remove(record).await
    }
}

#[async_trait]
impl<S: ChainTip> ChainTip for FlakyStore<S> {
    async fn last_block(&self) -> Result<Option<BlockHeader>> {
        self.inner.last_block().await
    }

    async fn header_at(&self, height: u64) -> Result<Option<BlockHeader>> {
        self.inner.header_at(height).await
    }
}

#[async_trait]
impl<S: BlockWriter> BlockWriter for FlakyStore<S> {
    async fn save_block(&self, block: &Block) -> Result<()> {
        self.inner.save_block(block).await
    }

    async fn delete_block(&self, header: &BlockHeader) -> Result<()> {
        self.inner.delete_block(header).await
    }
}
