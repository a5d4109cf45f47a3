//! The handler contract.
//!
//! Every transaction type implements [`TransactionHandler`]. The provided
//! methods implement the shared behaviour (fee and amount debit, balance
//! check, history replay); a type overrides only the steps it changes.

use async_trait::async_trait;
use num_traits::Signed;
use stakeledger_core::{
    BigInt, PublicKey, Transaction, TransactionKey, ValidationError, Wallet, WalletRegistry,
};

use crate::context::{flush_change, BootstrapContext, Changes, TxContext};
use crate::error::{HandlerError, Result};
use crate::events::EventSink;
use crate::pool::{PoolRejection, PoolView};

/// Per-type transaction logic, dispatched by (type, type-group).
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    fn key(&self) -> TransactionKey;

    /// Rebuild this type's effects from confirmed history.
    ///
    /// Replays every persisted transaction of this type in chain order,
    /// without validation, and writes any expiration changes immediately.
    async fn bootstrap(&self, ctx: &BootstrapContext<'_>, registry: &mut WalletRegistry) -> Result<usize> {
        let records = ctx.history.find_all_by_type(self.key()).await?;
        for record in &records {
            let changes = self.apply(&record.transaction, &TxContext::for_replay(record), registry)?;
            for change in &changes {
                flush_change(ctx.expirations, change).await?;
            }
        }
        Ok(records.len())
    }

    /// Check that `tx` can be applied on top of the current state.
    ///
    /// Pure: never mutates. `sender` is the wallet owning the sender key.
    fn can_be_applied(
        &self,
        tx: &Transaction,
        ctx: &TxContext,
        sender: &Wallet,
        _registry: &WalletRegistry,
    ) -> std::result::Result<(), ValidationError> {
        base_can_be_applied(tx, ctx, sender)
    }

    /// Pool-only admission policy. Accepts by default.
    fn can_enter_pool(
        &self,
        _tx: &Transaction,
        _pool: &dyn PoolView,
    ) -> std::result::Result<(), PoolRejection> {
        Ok(())
    }

    /// Apply to the sender, then the recipient.
    fn apply(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let mut changes = self.apply_to_sender(tx, ctx, registry)?;
        changes.extend(self.apply_to_recipient(tx, ctx, registry)?);
        Ok(changes)
    }

    /// Exact inverse of [`TransactionHandler::apply`].
    fn revert(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let mut changes = self.revert_for_sender(tx, ctx, registry)?;
        changes.extend(self.revert_for_recipient(tx, ctx, registry)?);
        Ok(changes)
    }

    fn apply_to_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        debit_sender(tx, ctx, registry)?;
        Ok(Changes::new())
    }

    fn revert_for_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        credit_sender(tx, ctx, registry);
        Ok(Changes::new())
    }

    fn apply_to_recipient(&self, _tx: &Transaction, _ctx: &TxContext, _registry: &mut WalletRegistry) -> Result<Changes> {
        Ok(Changes::new())
    }

    fn revert_for_recipient(&self, _tx: &Transaction, _ctx: &TxContext, _registry: &mut WalletRegistry) -> Result<Changes> {
        Ok(Changes::new())
    }

    /// Announce a successful apply. Emits nothing by default.
    fn emit_events(&self, _tx: &Transaction, _sink: &dyn EventSink) {}
}

/// Checks every type shares: the sender key matches and the sender can pay
/// amount plus fee. Genesis transactions mint and skip the balance check.
pub fn base_can_be_applied(
    tx: &Transaction,
    ctx: &TxContext,
    sender: &Wallet,
) -> std::result::Result<(), ValidationError> {
    if let Some(public_key) = &sender.public_key {
        if public_key != tx.sender() {
            return Err(ValidationError::SenderMismatch);
        }
    }

    if !ctx.is_genesis() {
        let required = tx.total_debit();
        if sender.balance < required {
            return Err(ValidationError::InsufficientBalance {
                required,
                available: sender.balance.clone(),
            });
        }
    }
    Ok(())
}

/// Take amount plus fee from the sender. Refuses to leave a negative
/// balance outside of replay.
pub fn debit_sender(tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<()> {
    if ctx.is_genesis() {
        registry.find_by_public_key(tx.sender());
        return Ok(());
    }

    let wallet = registry.find_by_public_key(tx.sender());
    let balance = &wallet.balance - tx.total_debit();
    if balance.is_negative() && !ctx.replaying {
        return Err(HandlerError::invariant(format!(
            "transaction {} would leave {} with balance {}",
            tx.id, wallet.address, balance
        )));
    }
    wallet.balance = balance;
    Ok(())
}

/// Inverse of [`debit_sender`].
pub fn credit_sender(tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) {
    if ctx.is_genesis() {
        return;
    }
    registry.find_by_public_key(tx.sender()).balance += tx.total_debit();
}

/// Move `delta` of stake weight onto the voter's delegate, if it votes.
///
/// Keeps `vote_balance == Σ voters' stake_weight` after every step.
pub fn shift_vote_weight(registry: &mut WalletRegistry, vote: Option<PublicKey>, delta: &BigInt) {
    if let Some(delegate) = vote {
        if !registry.adjust_vote_balance(&delegate, delta) {
            tracing::warn!(%delegate, "voter points at an unknown delegate");
        }
    }
}
