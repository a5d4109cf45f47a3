//! The ledger: confirmed wallet state plus the machinery that moves it
//! forward and back one block at a time.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stakeledger_core::{
    validate_transaction, Block, BlockHeader, NetworkConfig, RoundCalculator, Transaction,
    TransactionId, WalletRegistry, GENESIS_HEIGHT,
};
use stakeledger_handlers::{
    flush_change, BootstrapContext, Changes, EventSink, ExpirationChange, ExpirationSweep,
    HandlerRegistry, NullSink, SweepReport, TransactionHandler, TxContext,
};
use stakeledger_store::{ChainTip, LedgerStore};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, PoolError, Result};
use crate::pool::{sender_view, PoolConfig, TransactionPool};

/// Configuration for the ledger.
///
/// Deserializes from a partial document; missing fields take their
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Blocks that can be reverted, counted back from the tip.
    pub max_reorg_depth: usize,
    pub pool: PoolConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_reorg_depth: 100,
            pool: PoolConfig::default(),
        }
    }
}

/// Outcome of [`Ledger::bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Transactions replayed across all types.
    pub replayed: usize,
    /// Stakes found already due at the tip and halved.
    pub halved: usize,
    pub wallets: usize,
    pub tip: Option<u64>,
}

/// Outcome of [`Ledger::apply_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReport {
    pub height: u64,
    pub transactions: usize,
    /// Present when the block opened a round.
    pub sweep: Option<SweepReport>,
}

/// The ledger state engine.
///
/// Owns the confirmed [`WalletRegistry`] and the transaction pool. Blocks
/// apply all-or-nothing: a failing transaction rolls back every earlier
/// one in reverse order before the error is returned.
pub struct Ledger<S: LedgerStore> {
    store: Arc<S>,
    network: Arc<NetworkConfig>,
    config: LedgerConfig,
    handlers: HandlerRegistry,
    rounds: RoundCalculator,
    registry: WalletRegistry,
    tip: Option<BlockHeader>,
    /// Recent headers, oldest first, tip last.
    history: VecDeque<BlockHeader>,
    pool: TransactionPool,
    sink: Arc<dyn EventSink>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a ledger with every built-in transaction type.
    ///
    /// The ledger starts empty; call [`Ledger::bootstrap`] to load state
    /// from the store.
    pub fn new(store: S, network: NetworkConfig, config: LedgerConfig) -> Result<Self> {
        let network = Arc::new(network);
        let rounds = RoundCalculator::new(&network.milestones)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(network.epoch));
        Ok(Self {
            store: Arc::new(store),
            handlers: HandlerRegistry::with_defaults(Arc::clone(&network)),
            rounds,
            registry: WalletRegistry::new(),
            tip: None,
            history: VecDeque::new(),
            pool: TransactionPool::new(config.pool, clock),
            sink: Arc::new(NullSink),
            network,
            config,
        })
    }

    /// Use `clock` for pool admission.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.pool = TransactionPool::new(self.config.pool, clock);
        self.resync_pool(&HashSet::new());
        self
    }

    /// Deliver events to `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register an additional transaction type.
    pub fn with_handler(mut self, handler: Arc<dyn TransactionHandler>) -> Result<Self> {
        self.handlers.register(handler)?;
        Ok(self)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn rounds(&self) -> &RoundCalculator {
        &self.rounds
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Confirmed wallet state.
    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }

    pub fn tip(&self) -> Option<&BlockHeader> {
        self.tip.as_ref()
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bootstrap
    // ─────────────────────────────────────────────────────────────────────────

    /// Rebuild confirmed state from the store's history.
    ///
    /// Replays every type in registration order into a fresh registry,
    /// settles stakes already due at the tip, then recomputes delegate vote
    /// balances. The current state is replaced only if all of that
    /// succeeds and no wallet ends up negative.
    pub async fn bootstrap(&mut self) -> Result<BootstrapReport> {
        let tip = self.store.last_block().await?;
        let mut registry = WalletRegistry::new();
        let ctx = BootstrapContext {
            history: &*self.store,
            expirations: &*self.store,
            headers: &*self.store,
            rounds: &self.rounds,
            tip,
        };

        let mut replayed = 0;
        for handler in self.handlers.iter() {
            let count = handler.bootstrap(&ctx, &mut registry).await?;
            tracing::debug!(key = %handler.key(), count, "replayed transaction type");
            replayed += count;
        }

        let halved = match ctx.tip_timestamp() {
            Some(timestamp) => {
                ExpirationSweep::settle_after_replay(&*self.store, &mut registry, timestamp)
                    .await?
            }
            None => 0,
        };

        registry.rebuild_vote_balances();
        let negative = registry.negative_wallets();
        if let Some(first) = negative.first() {
            return Err(LedgerError::CorruptState(format!(
                "{} wallet(s) negative after replay, first {}",
                negative.len(),
                first
            )));
        }

        let report = BootstrapReport {
            replayed,
            halved,
            wallets: registry.len(),
            tip: tip.map(|h| h.height),
        };
        self.registry = registry;
        self.tip = tip;
        self.history = tip.into_iter().collect();
        self.resync_pool(&HashSet::new());

        tracing::info!(
            replayed,
            halved,
            wallets = report.wallets,
            tip = ?report.tip,
            "ledger bootstrapped"
        );
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Blocks
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a block on top of the tip.
    ///
    /// Every transaction is validated and applied in block order. If one
    /// fails, the ones before it are reverted in reverse order and the
    /// registry is left as it was. Expiration changes are written only
    /// once all transactions succeeded. Blocks that open a round finish
    /// with an expiration sweep; a sweep failure is returned but the block
    /// stays applied.
    pub async fn apply_block(&mut self, block: &Block) -> Result<BlockReport> {
        self.check_extends_tip(&block.header)?;
        let ctx = TxContext::for_block(&block.header);

        let mut changes = Changes::new();
        for (index, tx) in block.transactions.iter().enumerate() {
            match self.apply_transaction(tx, &ctx) {
                Ok(applied) => changes.extend(applied),
                Err(err) => {
                    tracing::warn!(
                        height = block.height(),
                        tx = %tx.id,
                        error = %err,
                        "block rejected, rolling back"
                    );
                    self.unwind(&block.transactions[..index], &ctx);
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.flush(&changes).await {
            self.unwind(&block.transactions, &ctx);
            return Err(err);
        }

        self.advance_tip(block.header);
        for tx in &block.transactions {
            if let Ok(handler) = self.handlers.get(tx.key()) {
                handler.emit_events(tx, self.sink.as_ref());
            }
        }

        let sweep = if self.rounds.is_new_round(block.height()) {
            Some(self.run_expiration_sweep(&block.header).await)
        } else {
            None
        };

        let included: HashSet<TransactionId> = block.transactions.iter().map(|tx| tx.id).collect();
        self.resync_pool(&included);

        tracing::debug!(
            height = block.height(),
            transactions = block.transactions.len(),
            "block applied"
        );
        Ok(BlockReport {
            height: block.height(),
            transactions: block.transactions.len(),
            sweep: sweep.transpose()?,
        })
    }

    /// Revert the tip block.
    ///
    /// Transactions are reverted in reverse block order and return to the
    /// pool. Stakes halved by a sweep stay halved.
    pub async fn revert_block(&mut self, block: &Block) -> Result<()> {
        let tip_height = self.tip.map(|h| h.height);
        if self.tip.map(|h| h.id) != Some(block.header.id) {
            return Err(LedgerError::NotOnTip {
                height: block.height(),
                tip: tip_height,
            });
        }

        let parent = if block.height() == GENESIS_HEIGHT {
            None
        } else if self.history.len() >= 2 {
            Some(self.history[self.history.len() - 2])
        } else {
            return Err(LedgerError::ReorgTooDeep {
                max_depth: self.config.max_reorg_depth,
            });
        };

        let ctx = TxContext::for_block(&block.header);
        let mut changes = Changes::new();
        for (index, tx) in block.transactions.iter().enumerate().rev() {
            match self.revert_transaction(tx, &ctx) {
                Ok(reverted) => changes.extend(reverted),
                Err(err) => {
                    self.replay(&block.transactions[index + 1..], &ctx);
                    return Err(err);
                }
            }
        }

        if let Err(err) = self.flush(&changes).await {
            self.replay(&block.transactions, &ctx);
            return Err(err);
        }

        self.history.pop_back();
        self.tip = parent;
        let next_height = self.next_height();
        self.pool.readmit(
            block.transactions.clone(),
            &self.registry,
            next_height,
            &self.handlers,
        );

        tracing::info!(height = block.height(), "block reverted");
        Ok(())
    }

    /// Halve every stake due before `header.timestamp`.
    pub async fn run_expiration_sweep(&mut self, header: &BlockHeader) -> Result<SweepReport> {
        let report =
            ExpirationSweep::run(&*self.store, &mut self.registry, header, self.sink.as_ref())
                .await?;
        if report.examined > 0 {
            tracing::info!(
                height = header.height,
                examined = report.examined,
                halved = report.halved,
                stale = report.stale,
                "expiration sweep"
            );
        }
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pool
    // ─────────────────────────────────────────────────────────────────────────

    /// Offer a transaction to the pool.
    pub fn submit(&mut self, tx: Transaction) -> std::result::Result<(), PoolError> {
        self.pool.add(tx, &self.handlers)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn next_height(&self) -> u64 {
        self.tip.map_or(GENESIS_HEIGHT, |h| h.height + 1)
    }

    fn check_extends_tip(&self, header: &BlockHeader) -> Result<()> {
        let previous = self.tip.map(|h| h.id);
        if header.height != self.next_height() || header.previous_block != previous {
            return Err(LedgerError::NotOnTip {
                height: header.height,
                tip: self.tip.map(|h| h.height),
            });
        }
        Ok(())
    }

    fn advance_tip(&mut self, header: BlockHeader) {
        self.tip = Some(header);
        self.history.push_back(header);
        while self.history.len() > self.config.max_reorg_depth + 1 {
            self.history.pop_front();
        }
    }

    fn apply_transaction(&mut self, tx: &Transaction, ctx: &TxContext) -> Result<Changes> {
        let rejected = |reason| LedgerError::Rejected { id: tx.id, reason };

        validate_transaction(tx).map_err(rejected)?;
        let handler = Arc::clone(self.handlers.get(tx.key())?);
        handler
            .can_be_applied(tx, ctx, &sender_view(&self.registry, tx.sender()), &self.registry)
            .map_err(rejected)?;
        Ok(handler.apply(tx, ctx, &mut self.registry)?)
    }

    fn revert_transaction(&mut self, tx: &Transaction, ctx: &TxContext) -> Result<Changes> {
        let handler = Arc::clone(self.handlers.get(tx.key())?);
        Ok(handler.revert(tx, ctx, &mut self.registry)?)
    }

    /// Revert already-applied transactions, last first.
    fn unwind(&mut self, applied: &[Transaction], ctx: &TxContext) {
        for tx in applied.iter().rev() {
            if let Err(err) = self.revert_transaction(tx, ctx) {
                tracing::error!(tx = %tx.id, error = %err, "rollback failed");
            }
        }
    }

    /// Re-apply transactions that were reverted, first first.
    fn replay(&mut self, reverted: &[Transaction], ctx: &TxContext) {
        for tx in reverted {
            let handler = match self.handlers.get(tx.key()) {
                Ok(handler) => Arc::clone(handler),
                Err(err) => {
                    tracing::error!(tx = %tx.id, error = %err, "restore failed");
                    continue;
                }
            };
            if let Err(err) = handler.apply(tx, ctx, &mut self.registry) {
                tracing::error!(tx = %tx.id, error = %err, "restore failed");
            }
        }
    }

    /// Write expiration changes in order. On failure, undo the ones that
    /// took effect, best-effort, and return the error.
    async fn flush(&self, changes: &[ExpirationChange]) -> Result<()> {
        let store = &*self.store;
        let mut written: Vec<&ExpirationChange> = Vec::new();

        for change in changes {
            match flush_change(store, change).await {
                Ok(true) => written.push(change),
                Ok(false) => {}
                Err(err) => {
                    for done in written.iter().rev() {
                        if let Err(undo) = flush_change(store, &done.inverse()).await {
                            tracing::error!(error = %undo, "expiration compensation failed");
                        }
                    }
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn resync_pool(&mut self, included: &HashSet<TransactionId>) {
        let next_height = self.next_height();
        self.pool
            .resync(&self.registry, next_height, included, &self.handlers);
    }
}
