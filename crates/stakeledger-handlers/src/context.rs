//! Inputs and outputs shared by all handlers.

use stakeledger_core::{BlockHeader, ExpirationRecord, RoundCalculator, GENESIS_HEIGHT};
use stakeledger_store::{ChainTip, ExpirationStore, TransactionHistory, TransactionRecord};

use crate::error::Result;

/// Where a transaction is being evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxContext {
    /// Height of the block the transaction belongs (or would belong) to.
    pub height: u64,
    /// Reference time in network seconds: the block timestamp on the block
    /// path, the validator clock on the pool path.
    pub timestamp: i64,
    /// Set during bootstrap. Replay runs one type at a time, so balances
    /// may dip below zero transiently and are checked once at the end.
    pub replaying: bool,
}

impl TxContext {
    pub fn new(height: u64, timestamp: i64) -> Self {
        Self {
            height,
            timestamp,
            replaying: false,
        }
    }

    pub fn for_block(header: &BlockHeader) -> Self {
        Self::new(header.height, header.timestamp)
    }

    pub fn for_replay(record: &TransactionRecord) -> Self {
        Self {
            height: record.block_height,
            timestamp: record.block_timestamp,
            replaying: true,
        }
    }

    /// Genesis transactions mint instead of moving funds.
    pub fn is_genesis(&self) -> bool {
        self.height == GENESIS_HEIGHT
    }
}

/// An expiration-index write produced by apply or revert.
///
/// Handlers never perform I/O; the ledger flushes these once the whole
/// block has applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpirationChange {
    Register(ExpirationRecord),
    Release(ExpirationRecord),
}

impl ExpirationChange {
    pub fn record(&self) -> &ExpirationRecord {
        match self {
            ExpirationChange::Register(r) | ExpirationChange::Release(r) => r,
        }
    }

    /// The change that undoes this one.
    pub fn inverse(&self) -> Self {
        match self {
            ExpirationChange::Register(r) => ExpirationChange::Release(r.clone()),
            ExpirationChange::Release(r) => ExpirationChange::Register(r.clone()),
        }
    }
}

/// Changes produced by one apply or revert.
pub type Changes = Vec<ExpirationChange>;

/// Apply a single change to the store.
///
/// # Returns
///
/// Whether the store was modified.
pub async fn flush_change(store: &dyn ExpirationStore, change: &ExpirationChange) -> Result<bool> {
    let modified = match change {
        ExpirationChange::Register(record) => store.register(record).await?,
        ExpirationChange::Release(record) => store.remove(record).await?,
    };
    Ok(modified)
}

/// Collaborators available to handler bootstrap.
pub struct BootstrapContext<'a> {
    pub history: &'a dyn TransactionHistory,
    pub expirations: &'a dyn ExpirationStore,
    pub headers: &'a dyn ChainTip,
    pub rounds: &'a RoundCalculator,
    /// Chain tip at bootstrap time; time-relative decisions use it.
    pub tip: Option<BlockHeader>,
}

impl<'a> BootstrapContext<'a> {
    pub fn tip_timestamp(&self) -> Option<i64> {
        self.tip.as_ref().map(|h| h.timestamp)
    }

    /// Header of the last round-opening block strictly below `height`,
    /// i.e. the most recent sweep a transaction at `height` came after.
    pub async fn last_sweep_before(&self, height: u64) -> Result<Option<BlockHeader>> {
        if height <= GENESIS_HEIGHT {
            return Ok(None);
        }
        let round_height = self.rounds.round(height - 1).round_height;
        Ok(self.headers.header_at(round_height).await?)
    }
}
