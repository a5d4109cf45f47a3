//! The transaction pool.
//!
//! Pending transactions are applied speculatively to a clone of the
//! confirmed registry, so each admission is checked against everything
//! admitted before it. The clone is discarded and rebuilt after every
//! confirmed block.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stakeledger_core::{
    validate_transaction, Address, PublicKey, Transaction, TransactionId, TransactionKey, Wallet,
    WalletRegistry,
};
use serde::{Deserialize, Serialize};
use stakeledger_handlers::{HandlerRegistry, PoolView, TransactionHandler, TxContext};

use crate::clock::Clock;
use crate::error::PoolError;

/// Pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: usize,
    /// Rejections a sender may accumulate before being refused outright.
    pub max_sender_strikes: u32,
    /// Blocks after a sender's first strike at which its record, and any
    /// ban, is forgotten.
    pub strike_expiry_blocks: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            max_sender_strikes: 3,
            strike_expiry_blocks: 100,
        }
    }
}

/// The sender's wallet as the registry would present it, without creating it.
pub(crate) fn sender_view<'a>(registry: &'a WalletRegistry, public_key: &PublicKey) -> Cow<'a, Wallet> {
    if let Some(wallet) = registry.get_by_public_key(public_key) {
        return Cow::Borrowed(wallet);
    }
    match registry.get(&Address::from_public_key(public_key)) {
        Some(wallet) => {
            let mut wallet = wallet.clone();
            wallet.public_key = Some(*public_key);
            Cow::Owned(wallet)
        }
        None => Cow::Owned(Wallet::with_public_key(*public_key)),
    }
}

#[derive(Debug, Clone, Copy)]
struct Strikes {
    count: u32,
    /// Pool height when the first strike landed.
    since: u64,
}

pub struct TransactionPool {
    config: PoolConfig,
    clock: Arc<dyn Clock>,
    /// Speculative state: confirmed registry plus every pending transaction.
    registry: WalletRegistry,
    /// Height the pending transactions would be included at.
    height: u64,
    pending: Vec<Transaction>,
    ids: HashSet<TransactionId>,
    strikes: HashMap<PublicKey, Strikes>,
}

impl TransactionPool {
    pub fn new(config: PoolConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            registry: WalletRegistry::new(),
            height: stakeledger_core::GENESIS_HEIGHT,
            pending: Vec::new(),
            ids: HashSet::new(),
            strikes: HashMap::new(),
        }
    }

    /// Admit `tx`, or explain why not.
    ///
    /// Rejections that the sender could not fix by waiting count as a
    /// strike against it.
    pub fn add(&mut self, tx: Transaction, handlers: &HandlerRegistry) -> Result<(), PoolError> {
        let sender = *tx.sender();
        if self.strikes(&sender) >= self.config.max_sender_strikes {
            return Err(PoolError::Banned(sender));
        }
        if self.ids.contains(&tx.id) {
            return Err(PoolError::Duplicate(tx.id));
        }
        if self.pending.len() >= self.config.max_size {
            return Err(PoolError::Full);
        }

        match self.admit(tx, handlers) {
            Ok(()) => Ok(()),
            Err(err) => {
                if Self::is_strike(&err) {
                    let height = self.height;
                    let strikes = self
                        .strikes
                        .entry(sender)
                        .or_insert(Strikes { count: 0, since: height });
                    strikes.count += 1;
                    tracing::debug!(%sender, strikes = strikes.count, error = %err, "pool strike");
                }
                Err(err)
            }
        }
    }

    fn is_strike(err: &PoolError) -> bool {
        match err {
            PoolError::Invalid(reason) => !reason.is_self_correcting(),
            PoolError::Handler(_) => true,
            _ => false,
        }
    }

    /// Validation, pool policy, state checks, then speculative apply.
    fn admit(&mut self, tx: Transaction, handlers: &HandlerRegistry) -> Result<(), PoolError> {
        validate_transaction(&tx)?;
        let handler = handlers.get(tx.key())?;
        handler.can_enter_pool(&tx, &*self)?;

        let ctx = TxContext::new(self.height, self.clock.now());
        handler.can_be_applied(&tx, &ctx, &sender_view(&self.registry, tx.sender()), &self.registry)?;
        handler.apply(&tx, &ctx, &mut self.registry)?;

        self.ids.insert(tx.id);
        self.pending.push(tx);
        Ok(())
    }

    /// Rebuild on top of newly confirmed state.
    ///
    /// `included` transactions are dropped; every other pending transaction
    /// is re-admitted in its original order. Those that no longer validate
    /// are dropped without a strike. Strike records older than
    /// `strike_expiry_blocks` are forgotten.
    pub fn resync(
        &mut self,
        confirmed: &WalletRegistry,
        next_height: u64,
        included: &HashSet<TransactionId>,
        handlers: &HandlerRegistry,
    ) {
        let previous = std::mem::take(&mut self.pending);
        self.ids.clear();
        self.registry = confirmed.clone();
        self.height = next_height;
        self.expire_strikes();

        let mut dropped = 0;
        for tx in previous {
            if included.contains(&tx.id) {
                continue;
            }
            let id = tx.id;
            if let Err(err) = self.admit(tx, handlers) {
                tracing::debug!(%id, error = %err, "dropped pending transaction");
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::info!(dropped, remaining = self.pending.len(), "pool resynced");
        }
    }

    /// Put transactions back in front of the queue, e.g. after a revert.
    pub fn readmit(
        &mut self,
        transactions: Vec<Transaction>,
        confirmed: &WalletRegistry,
        next_height: u64,
        handlers: &HandlerRegistry,
    ) {
        let mut queue = transactions;
        queue.append(&mut self.pending);
        self.pending = queue;
        self.resync(confirmed, next_height, &HashSet::new(), handlers);
    }

    fn expire_strikes(&mut self) {
        let (height, expiry) = (self.height, self.config.strike_expiry_blocks);
        let before = self.strikes.len();
        self.strikes.retain(|_, s| s.since.saturating_add(expiry) > height);
        let expired = before - self.strikes.len();
        if expired > 0 {
            tracing::debug!(expired, height, "sender strikes expired");
        }
    }

    pub fn strikes(&self, sender: &PublicKey) -> u32 {
        self.strikes.get(sender).map_or(0, |s| s.count)
    }

    /// Pending transactions in admission order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Speculative state after every pending transaction.
    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }
}

impl PoolView for TransactionPool {
    fn pending_by_type(&self, key: TransactionKey) -> Vec<&Transaction> {
        self.pending.iter().filter(|tx| tx.key() == key).collect()
    }
}
