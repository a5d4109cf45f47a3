//! Plain value transfer.

use stakeledger_core::{Transaction, TransactionKey, ValidationError, Wallet, WalletRegistry};

use crate::context::{Changes, TxContext};
use crate::error::{HandlerError, Result};
use crate::handler::{base_can_be_applied, TransactionHandler};

#[derive(Debug, Default)]
pub struct TransferHandler;

impl TransferHandler {
    fn recipient(tx: &Transaction) -> Result<stakeledger_core::Address> {
        tx.data
            .recipient
            .ok_or(HandlerError::Validation(ValidationError::MissingRecipient))
    }
}

impl TransactionHandler for TransferHandler {
    fn key(&self) -> TransactionKey {
        TransactionKey::TRANSFER
    }

    fn can_be_applied(
        &self,
        tx: &Transaction,
        ctx: &TxContext,
        sender: &Wallet,
        _registry: &WalletRegistry,
    ) -> std::result::Result<(), ValidationError> {
        if tx.data.recipient.is_none() {
            return Err(ValidationError::MissingRecipient);
        }
        base_can_be_applied(tx, ctx, sender)
    }

    fn apply_to_recipient(&self, tx: &Transaction, _ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let recipient = Self::recipient(tx)?;
        registry.find_by_address(&recipient).balance += &tx.data.amount;
        Ok(Changes::new())
    }

    fn revert_for_recipient(&self, tx: &Transaction, _ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let recipient = Self::recipient(tx)?;
        registry.find_by_address(&recipient).balance -= &tx.data.amount;
        Ok(Changes::new())
    }
}
