//! Vote and unvote: route the sender's stake weight to a delegate.

use stakeledger_core::{
    Asset, PublicKey, Transaction, TransactionKey, ValidationError, VoteAsset, Wallet,
    WalletRegistry,
};

use crate::context::{Changes, TxContext};
use crate::error::{HandlerError, Result};
use crate::events::{Event, EventSink};
use crate::handler::{base_can_be_applied, credit_sender, debit_sender, TransactionHandler};
use crate::pool::{one_per_sender, PoolRejection, PoolView};

fn vote(tx: &Transaction) -> Result<VoteAsset> {
    match &tx.data.asset {
        Asset::Vote(vote) => Ok(*vote),
        _ => Err(HandlerError::Validation(ValidationError::AssetMismatch(tx.key()))),
    }
}

#[derive(Debug, Default)]
pub struct VoteHandler;

impl VoteHandler {
    /// Point the sender at `delegate` and move its weight there.
    fn cast(registry: &mut WalletRegistry, voter: &PublicKey, delegate: &PublicKey, ctx: &TxContext) -> Result<()> {
        let wallet = registry.find_by_public_key(voter);
        wallet.vote = Some(*delegate);
        let weight = wallet.stake_weight.clone();
        if !registry.adjust_vote_balance(delegate, &weight) && !ctx.replaying {
            return Err(HandlerError::invariant(format!("vote for unknown delegate {delegate}")));
        }
        Ok(())
    }

    /// Clear the sender's vote and withdraw its weight.
    fn withdraw(registry: &mut WalletRegistry, voter: &PublicKey, delegate: &PublicKey, ctx: &TxContext) -> Result<()> {
        let wallet = registry.find_by_public_key(voter);
        wallet.vote = None;
        let weight = -wallet.stake_weight.clone();
        if !registry.adjust_vote_balance(delegate, &weight) && !ctx.replaying {
            return Err(HandlerError::invariant(format!("unvote from unknown delegate {delegate}")));
        }
        Ok(())
    }
}

impl TransactionHandler for VoteHandler {
    fn key(&self) -> TransactionKey {
        TransactionKey::VOTE
    }

    fn can_be_applied(
        &self,
        tx: &Transaction,
        ctx: &TxContext,
        sender: &Wallet,
        registry: &WalletRegistry,
    ) -> std::result::Result<(), ValidationError> {
        let asset = vote(tx).map_err(|_| ValidationError::AssetMismatch(tx.key()))?;
        match asset {
            VoteAsset::Vote(delegate) => {
                if sender.vote.is_some() {
                    return Err(ValidationError::AlreadyVoted);
                }
                let is_delegate = registry
                    .get_by_public_key(&delegate)
                    .map(Wallet::is_delegate)
                    .unwrap_or(false);
                if !is_delegate {
                    return Err(ValidationError::VotedForNonDelegate(delegate));
                }
            }
            VoteAsset::Unvote(delegate) => match sender.vote {
                None => return Err(ValidationError::NoVote),
                Some(current) if current != delegate => return Err(ValidationError::UnvoteMismatch),
                Some(_) => {}
            },
        }
        base_can_be_applied(tx, ctx, sender)
    }

    fn can_enter_pool(
        &self,
        tx: &Transaction,
        pool: &dyn PoolView,
    ) -> std::result::Result<(), PoolRejection> {
        one_per_sender(tx, pool)
    }

    fn apply_to_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        debit_sender(tx, ctx, registry)?;
        match vote(tx)? {
            VoteAsset::Vote(delegate) => Self::cast(registry, tx.sender(), &delegate, ctx)?,
            VoteAsset::Unvote(delegate) => Self::withdraw(registry, tx.sender(), &delegate, ctx)?,
        }
        Ok(Changes::new())
    }

    fn revert_for_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        match vote(tx)? {
            VoteAsset::Vote(delegate) => Self::withdraw(registry, tx.sender(), &delegate, ctx)?,
            VoteAsset::Unvote(delegate) => Self::cast(registry, tx.sender(), &delegate, ctx)?,
        }
        credit_sender(tx, ctx, registry);
        Ok(Changes::new())
    }

    fn emit_events(&self, tx: &Transaction, sink: &dyn EventSink) {
        let public_key = *tx.sender();
        match vote(tx) {
            Ok(VoteAsset::Vote(delegate)) => sink.emit(Event::WalletVoted { public_key, delegate }),
            Ok(VoteAsset::Unvote(delegate)) => sink.emit(Event::WalletUnvoted { public_key, delegate }),
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use stakeledger_core::{BigInt, TransactionBuilder};

    #[test]
    fn test_vote_moves_stake_weight() {
        let mut registry = funded(&[(1, 10), (2, 10)]);
        let delegate = make_delegate(&mut registry, 2, "del");
        registry.find_by_public_key(&keypair(1).public_key()).stake_weight = BigInt::from(40);
        let ctx = TxContext::new(2, 0);
        let before = registry.clone();

        let tx = TransactionBuilder::vote(delegate).sign(&keypair(1));
        check_and_apply(&VoteHandler, &tx, &ctx, &mut registry);
        assert_eq!(registry.get_by_public_key(&delegate).unwrap().vote_balance, BigInt::from(40));
        assert_eq!(sender(&registry, &tx).vote, Some(delegate));

        VoteHandler.revert(&tx, &ctx, &mut registry).unwrap();
        assert_eq!(registry.state_hash().unwrap(), before.state_hash().unwrap());
    }

    #[test]
    fn test_unvote_rules() {
        let mut registry = funded(&[(1, 10), (2, 10), (3, 10)]);
        let d1 = make_delegate(&mut registry, 2, "one");
        let d2 = make_delegate(&mut registry, 3, "two");
        let ctx = TxContext::new(2, 0);

        let unvote = TransactionBuilder::unvote(d1).sign(&keypair(1));
        assert_eq!(
            VoteHandler.can_be_applied(&unvote, &ctx, sender(&registry, &unvote), &registry),
            Err(ValidationError::NoVote)
        );

        check_and_apply(&VoteHandler, &TransactionBuilder::vote(d1).sign(&keypair(1)), &ctx, &mut registry);

        let wrong = TransactionBuilder::unvote(d2).sign(&keypair(1));
        assert_eq!(
            VoteHandler.can_be_applied(&wrong, &ctx, sender(&registry, &wrong), &registry),
            Err(ValidationError::UnvoteMismatch)
        );
        let again = TransactionBuilder::vote(d2).sign(&keypair(1));
        assert_eq!(
            VoteHandler.can_be_applied(&again, &ctx, sender(&registry, &again), &registry),
            Err(ValidationError::AlreadyVoted)
        );

        check_and_apply(&VoteHandler, &unvote, &ctx, &mut registry);
        assert_eq!(sender(&registry, &unvote).vote, None);
    }

    #[test]
    fn test_vote_for_non_delegate() {
        let registry = funded(&[(1, 10), (2, 10)]);
        let target = keypair(2).public_key();
        let tx = TransactionBuilder::vote(target).sign(&keypair(1));
        assert_eq!(
            VoteHandler.can_be_applied(&tx, &TxContext::new(2, 0), sender(&registry, &tx), &registry),
            Err(ValidationError::VotedForNonDelegate(target))
        );
    }
}
