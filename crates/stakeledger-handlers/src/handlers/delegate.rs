//! Delegate registration: claims a unique username for the sender.

use stakeledger_core::{Asset, Transaction, TransactionKey, ValidationError, Wallet, WalletRegistry};

use crate::context::{Changes, TxContext};
use crate::error::{HandlerError, Result};
use crate::events::{Event, EventSink};
use crate::handler::{base_can_be_applied, credit_sender, debit_sender, TransactionHandler};
use crate::pool::{one_per_sender, PoolRejection, PoolView};

const MAX_USERNAME_LEN: usize = 20;

/// Lowercase alphanumerics plus `!@$&_.`, 1 to 20 characters.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "!@$&_.".contains(c))
}

fn username(tx: &Transaction) -> Result<&str> {
    match &tx.data.asset {
        Asset::DelegateRegistration { username } => Ok(username),
        _ => Err(HandlerError::Validation(ValidationError::AssetMismatch(tx.key()))),
    }
}

#[derive(Debug, Default)]
pub struct DelegateRegistrationHandler;

impl TransactionHandler for DelegateRegistrationHandler {
    fn key(&self) -> TransactionKey {
        TransactionKey::DELEGATE_REGISTRATION
    }

    fn can_be_applied(
        &self,
        tx: &Transaction,
        ctx: &TxContext,
        sender: &Wallet,
        registry: &WalletRegistry,
    ) -> std::result::Result<(), ValidationError> {
        let name = username(tx).map_err(|_| ValidationError::AssetMismatch(tx.key()))?;
        if !is_valid_username(name) {
            return Err(ValidationError::InvalidUsername(name.to_string()));
        }
        if sender.is_delegate() {
            return Err(ValidationError::WalletAlreadyDelegate);
        }
        if registry.has_by_username(name) {
            return Err(ValidationError::UsernameTaken(name.to_string()));
        }
        base_can_be_applied(tx, ctx, sender)
    }

    fn can_enter_pool(
        &self,
        tx: &Transaction,
        pool: &dyn PoolView,
    ) -> std::result::Result<(), PoolRejection> {
        one_per_sender(tx, pool)?;

        let Ok(name) = username(tx) else {
            return Ok(());
        };
        let claimed = pool
            .pending_by_type(self.key())
            .into_iter()
            .any(|pending| username(pending).map(|n| n == name).unwrap_or(false));
        if claimed {
            return Err(PoolRejection::Conflict(format!(
                "username {name:?} is already pending"
            )));
        }
        Ok(())
    }

    fn apply_to_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let name = username(tx)?.to_string();
        if !ctx.replaying && registry.has_by_username(&name) {
            return Err(HandlerError::invariant(format!(
                "username {name:?} registered twice"
            )));
        }

        debit_sender(tx, ctx, registry)?;
        let wallet = registry.find_by_public_key(tx.sender());
        wallet.username = Some(name);
        let address = wallet.address;
        registry.index(&address);
        Ok(Changes::new())
    }

    fn revert_for_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let name = username(tx)?;
        registry.forget_by_username(name);
        registry.find_by_public_key(tx.sender()).username = None;
        credit_sender(tx, ctx, registry);
        Ok(Changes::new())
    }

    fn emit_events(&self, tx: &Transaction, sink: &dyn EventSink) {
        if let Ok(name) = username(tx) {
            sink.emit(Event::DelegateRegistered {
                public_key: *tx.sender(),
                username: name.to_string(),
            });
        }
    }
}
