//! Stake redemption: return a matured stake's principal and withdraw its
//! weight.

use async_trait::async_trait;
use stakeledger_core::{
    Asset, ExpirationRecord, StakeStatus, Transaction, TransactionKey, ValidationError, Wallet,
    WalletRegistry,
};

use crate::context::{flush_change, BootstrapContext, Changes, ExpirationChange, TxContext};
use crate::error::{HandlerError, Result};
use crate::events::{Event, EventSink};
use crate::handler::{
    base_can_be_applied, credit_sender, debit_sender, shift_vote_weight, TransactionHandler,
};
use crate::pool::{one_per_sender, PoolRejection, PoolView};
use crate::sweep::ExpirationSweep;

fn stake_key(tx: &Transaction) -> std::result::Result<i64, ValidationError> {
    match tx.data.asset {
        Asset::StakeRedeem { stake_key } => Ok(stake_key),
        _ => Err(ValidationError::AssetMismatch(tx.key())),
    }
}

/// The unhalved stake `tx` redeems, as an expiration record.
fn unhalved_stake(tx: &Transaction, registry: &WalletRegistry) -> Option<ExpirationRecord> {
    let key = stake_key(tx).ok()?;
    let wallet = registry.get_by_public_key(tx.sender())?;
    let stake = wallet.stakes.get(&key).filter(|s| !s.halved)?;
    Some(ExpirationRecord::for_stake(wallet.address, stake))
}

#[derive(Debug, Default)]
pub struct StakeRedeemHandler;

#[async_trait]
impl TransactionHandler for StakeRedeemHandler {
    fn key(&self) -> TransactionKey {
        TransactionKey::STAKE_REDEEM
    }

    /// Replay redemptions. Creation replay never halves, so a stake that a
    /// sweep reached before it was redeemed is halved here first; otherwise
    /// the archived copy would carry its full weight.
    async fn bootstrap(&self, ctx: &BootstrapContext<'_>, registry: &mut WalletRegistry) -> Result<usize> {
        let records = ctx.history.find_all_by_type(self.key()).await?;
        for record in &records {
            let tx = &record.transaction;
            if let Some(expiration) = unhalved_stake(tx, registry) {
                if let Some(sweep) = ctx.last_sweep_before(record.block_height).await? {
                    if ExpirationSweep::halve(registry, &expiration, sweep.timestamp).is_some() {
                        tracing::debug!(
                            address = %expiration.address,
                            stake_key = expiration.stake_key,
                            swept_at = sweep.height,
                            "halved stake before replaying its redemption"
                        );
                    }
                }
            }
            let changes = self.apply(tx, &TxContext::for_replay(record), registry)?;
            for change in &changes {
                flush_change(ctx.expirations, change).await?;
            }
        }
        Ok(records.len())
    }

    fn can_be_applied(
        &self,
        tx: &Transaction,
        ctx: &TxContext,
        sender: &Wallet,
        _registry: &WalletRegistry,
    ) -> std::result::Result<(), ValidationError> {
        let key = stake_key(tx)?;
        if sender.redeemed_stakes.contains_key(&key) {
            return Err(ValidationError::StakeAlreadyRedeemed(key));
        }
        let stake = sender
            .stakes
            .get(&key)
            .ok_or(ValidationError::StakeNotFound(key))?;
        if stake.status(ctx.timestamp) == StakeStatus::Created {
            return Err(ValidationError::StakeNotYetRedeemable {
                key,
                redeemable_at: stake.redeemable_timestamp,
            });
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
        let key = stake_key(tx)?;
        if !registry
            .get_by_public_key(tx.sender())
            .map(|w| w.stakes.contains_key(&key))
            .unwrap_or(false)
        {
            return Err(HandlerError::invariant(format!(
                "redeem {} names missing stake {key}",
                tx.id
            )));
        }

        debit_sender(tx, ctx, registry)?;

        let wallet = registry.find_by_public_key(tx.sender());
        let Some(mut stake) = wallet.stakes.remove(&key) else {
            return Err(HandlerError::invariant(format!("stake {key} vanished mid-apply")));
        };
        wallet.balance += &stake.amount;
        wallet.stake_weight -= &stake.weight;
        let vote = wallet.vote;
        let release = (!stake.halved).then(|| ExpirationRecord::for_stake(wallet.address, &stake));
        let weight = -stake.weight.clone();
        stake.redeemed = true;
        wallet.redeemed_stakes.insert(key, stake);

        shift_vote_weight(registry, vote, &weight);
        Ok(release.map(ExpirationChange::Release).into_iter().collect())
    }

    fn revert_for_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let key = stake_key(tx)?;

        let wallet = registry.find_by_public_key(tx.sender());
        let Some(mut stake) = wallet.redeemed_stakes.remove(&key) else {
            return Err(HandlerError::invariant(format!(
                "reverting redeem of {key} but {} never redeemed it",
                wallet.address
            )));
        };
        stake.redeemed = false;
        wallet.balance -= &stake.amount;
        wallet.stake_weight += &stake.weight;
        let vote = wallet.vote;
        let register = (!stake.halved).then(|| ExpirationRecord::for_stake(wallet.address, &stake));
        let weight = stake.weight.clone();
        wallet.stakes.insert(key, stake);

        shift_vote_weight(registry, vote, &weight);
        credit_sender(tx, ctx, registry);
        Ok(register.map(ExpirationChange::Register).into_iter().collect())
    }

    fn emit_events(&self, tx: &Transaction, sink: &dyn EventSink) {
        if let Ok(stake_key) = stake_key(tx) {
            sink.emit(Event::StakeRedeemed {
                public_key: *tx.sender(),
                stake_key,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use crate::handlers::StakeCreateHandler;
    use stakeledger_core::{BigInt, NetworkConfig, TransactionBuilder};
    use std::sync::Arc;

    const DURATION: i64 = 15_778_800;
    const CREATED: i64 = 1_000;
    const MATURE: i64 = CREATED + DURATION;

    /// Wallet 1 with 1000 coins, 100 of them staked at 2×.
    fn staked() -> (WalletRegistry, Transaction) {
        let mut registry = funded(&[(1, 1000)]);
        let create = TransactionBuilder::stake_create(DURATION, COIN * 100, CREATED).sign(&keypair(1));
        check_and_apply(
            &StakeCreateHandler::new(Arc::new(NetworkConfig::devnet())),
            &create,
            &TxContext::new(5, CREATED),
            &mut registry,
        );
        (registry, create)
    }

    fn redeem(at: i64) -> Transaction {
        TransactionBuilder::stake_redeem(CREATED)
            .timestamp(at)
            .sign(&keypair(1))
    }

    #[test]
    fn test_redeem_returns_principal() {
        let (mut registry, _) = staked();
        let tx = redeem(MATURE);
        let ctx = TxContext::new(9, MATURE);
        let before = registry.clone();

        check_and_apply(&StakeRedeemHandler, &tx, &ctx, &mut registry);
        let wallet = sender(&registry, &tx);
        assert_eq!(wallet.balance, BigInt::from(COIN * 1000));
        assert_eq!(wallet.stake_weight, BigInt::from(0));
        assert!(wallet.stakes.is_empty());
        assert!(wallet.redeemed_stakes[&CREATED].redeemed);

        let changes = StakeRedeemHandler.revert(&tx, &ctx, &mut registry).unwrap();
        assert!(matches!(changes.as_slice(), [ExpirationChange::Register(_)]));
        assert_eq!(registry.state_hash().unwrap(), before.state_hash().unwrap());
    }

    #[test]
    fn test_halved_stake_releases_nothing() {
        let (mut registry, _) = staked();
        let pk = keypair(1).public_key();
        let wallet = registry.find_by_public_key(&pk);
        let removed = wallet.stakes.get_mut(&CREATED).unwrap().halve();
        wallet.stake_weight -= removed;

        let tx = redeem(MATURE + 10);
        let ctx = TxContext::new(9, MATURE + 10);
        check_and_apply(&StakeRedeemHandler, &tx, &ctx, &mut registry);
        assert_eq!(sender(&registry, &tx).stake_weight, BigInt::from(0));

        let changes = StakeRedeemHandler.revert(&tx, &ctx, &mut registry).unwrap();
        assert!(changes.is_empty());
        assert!(sender(&registry, &tx).stakes[&CREATED].halved);
    }

    #[test]
    fn test_maturity_follows_block_time_not_tx_time() {
        let (registry, _) = staked();
        let ctx = TxContext::new(6, CREATED + 60);

        let future_dated = redeem(i64::MAX / 2);
        assert_eq!(
            StakeRedeemHandler.can_be_applied(
                &future_dated,
                &ctx,
                sender(&registry, &future_dated),
                &registry
            ),
            Err(ValidationError::StakeNotYetRedeemable {
                key: CREATED,
                redeemable_at: MATURE
            })
        );

        // An old tx timestamp is fine once the block is past maturity.
        let stale = redeem(CREATED);
        let mature = TxContext::new(9, MATURE);
        assert_eq!(
            StakeRedeemHandler.can_be_applied(&stale, &mature, sender(&registry, &stale), &registry),
            Ok(())
        );
    }

    #[test]
    fn test_redeem_errors() {
        let (mut registry, _) = staked();
        let ctx = TxContext::new(9, MATURE);

        let early = redeem(MATURE - 1);
        let before_maturity = TxContext::new(9, MATURE - 1);
        assert_eq!(
            StakeRedeemHandler.can_be_applied(&early, &before_maturity, sender(&registry, &early), &registry),
            Err(ValidationError::StakeNotYetRedeemable {
                key: CREATED,
                redeemable_at: MATURE
            })
        );

        let unknown = TransactionBuilder::stake_redeem(42).timestamp(MATURE).sign(&keypair(1));
        assert_eq!(
            StakeRedeemHandler.can_be_applied(&unknown, &ctx, sender(&registry, &unknown), &registry),
            Err(ValidationError::StakeNotFound(42))
        );

        check_and_apply(&StakeRedeemHandler, &redeem(MATURE), &ctx, &mut registry);
        let twice = redeem(MATURE + 1);
        assert_eq!(
            StakeRedeemHandler.can_be_applied(&twice, &ctx, sender(&registry, &twice), &registry),
            Err(ValidationError::StakeAlreadyRedeemed(CREATED))
        );
    }
}
