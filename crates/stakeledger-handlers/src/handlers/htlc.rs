//! Hash time-locked transfers: the amount leaves the sender's spendable
//! balance and is held under the `htlc.lockedBalance` attribute.

use stakeledger_core::{
    Asset, HtlcExpiration, Transaction, TransactionKey, ValidationError, Wallet, WalletRegistry,
    HTLC_LOCKED_BALANCE,
};

use crate::context::{Changes, TxContext};
use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::handler::{base_can_be_applied, credit_sender, debit_sender, TransactionHandler};

#[derive(Debug, Default)]
pub struct HtlcLockHandler;

impl HtlcLockHandler {
    fn is_expired(expiration: &HtlcExpiration, ctx: &TxContext) -> bool {
        match *expiration {
            HtlcExpiration::Timestamp(at) => at <= ctx.timestamp,
            HtlcExpiration::BlockHeight(at) => at <= ctx.height,
        }
    }

    fn adjust_locked(tx: &Transaction, registry: &mut WalletRegistry, add: bool) {
        let wallet = registry.find_by_public_key(tx.sender());
        let current = wallet.attribute_amount(HTLC_LOCKED_BALANCE);
        let updated = if add {
            current + &tx.data.amount
        } else {
            current - &tx.data.amount
        };
        wallet.set_attribute_amount(HTLC_LOCKED_BALANCE, updated);
    }
}

impl TransactionHandler for HtlcLockHandler {
    fn key(&self) -> TransactionKey {
        TransactionKey::HTLC_LOCK
    }

    fn can_be_applied(
        &self,
        tx: &Transaction,
        ctx: &TxContext,
        sender: &Wallet,
        _registry: &WalletRegistry,
    ) -> std::result::Result<(), ValidationError> {
        let Asset::HtlcLock { expiration, .. } = &tx.data.asset else {
            return Err(ValidationError::AssetMismatch(tx.key()));
        };
        if tx.data.recipient.is_none() {
            return Err(ValidationError::MissingRecipient);
        }
        if Self::is_expired(expiration, ctx) {
            return Err(ValidationError::HtlcLockExpired);
        }
        base_can_be_applied(tx, ctx, sender)
    }

    fn apply_to_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        debit_sender(tx, ctx, registry)?;
        Self::adjust_locked(tx, registry, true);
        Ok(Changes::new())
    }

    fn revert_for_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        Self::adjust_locked(tx, registry, false);
        credit_sender(tx, ctx, registry);
        Ok(Changes::new())
    }

    fn emit_events(&self, tx: &Transaction, sink: &dyn EventSink) {
        sink.emit(Event::HtlcLocked {
            transaction: tx.id,
            public_key: *tx.sender(),
        });
    }
}
