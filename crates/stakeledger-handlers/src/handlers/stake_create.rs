//! Stake creation: lock principal for a configured duration in exchange for
//! multiplied vote weight.

use std::sync::Arc;

use async_trait::async_trait;
use num_traits::{Signed, Zero};
use stakeledger_core::{
    Asset, BigInt, ExpirationRecord, NetworkConfig, StakeCreateAsset, StakeObject, Transaction,
    TransactionKey, ValidationError, Wallet, WalletRegistry,
};

use crate::context::{flush_change, BootstrapContext, Changes, ExpirationChange, TxContext};
use crate::error::{HandlerError, Result};
use crate::events::{Event, EventSink};
use crate::handler::{
    base_can_be_applied, credit_sender, debit_sender, shift_vote_weight, TransactionHandler,
};
use crate::pool::{one_per_sender, PoolRejection, PoolView};

fn stake_asset(tx: &Transaction) -> std::result::Result<&StakeCreateAsset, ValidationError> {
    match &tx.data.asset {
        Asset::StakeCreate(asset) => Ok(asset),
        _ => Err(ValidationError::AssetMismatch(tx.key())),
    }
}

pub struct StakeCreateHandler {
    config: Arc<NetworkConfig>,
}

impl StakeCreateHandler {
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        Self { config }
    }

    /// Build the stake object `tx` would create at `height`.
    fn stake_for(&self, asset: &StakeCreateAsset, height: u64) -> std::result::Result<StakeObject, ValidationError> {
        let multiplier = self
            .config
            .milestone(height)
            .multiplier_for(asset.duration)
            .ok_or(ValidationError::StakeDurationInvalid(asset.duration))?;
        Ok(StakeObject::new(
            asset.amount.clone(),
            multiplier.apply(&asset.amount),
            asset.duration,
            asset.timestamp,
        ))
    }

    fn is_whole_units(&self, amount: &BigInt) -> bool {
        amount.is_positive() && (amount % BigInt::from(self.config.base_unit.max(1))).is_zero()
    }
}

#[async_trait]
impl TransactionHandler for StakeCreateHandler {
    fn key(&self) -> TransactionKey {
        TransactionKey::STAKE_CREATE
    }

    /// Replay like every other type, but leave out expiration records for
    /// stakes that were already due at the chain tip. Whether those were
    /// halved is settled once all history has replayed.
    async fn bootstrap(&self, ctx: &BootstrapContext<'_>, registry: &mut WalletRegistry) -> Result<usize> {
        let records = ctx.history.find_all_by_type(self.key()).await?;
        let tip_timestamp = ctx.tip_timestamp();

        for record in &records {
            let changes = self.apply(&record.transaction, &TxContext::for_replay(record), registry)?;
            for change in &changes {
                let due = tip_timestamp
                    .map(|ts| ts > change.record().redeemable_timestamp)
                    .unwrap_or(false);
                if !due {
                    flush_change(ctx.expirations, change).await?;
                }
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
        let asset = stake_asset(tx)?;

        let window = self.config.stake_timestamp_window;
        if asset.timestamp.abs_diff(ctx.timestamp) > window.unsigned_abs() {
            return Err(ValidationError::StakeTimestampOutOfWindow {
                timestamp: asset.timestamp,
                reference: ctx.timestamp,
                window,
            });
        }

        if sender.has_stake_key(asset.timestamp) {
            return Err(ValidationError::DuplicateStakeKey(asset.timestamp));
        }

        if !self.is_whole_units(&asset.amount) {
            return Err(ValidationError::StakeAmountNotInteger(asset.amount.clone()));
        }

        if asset.amount > &sender.balance - &tx.data.fee {
            return Err(ValidationError::InsufficientBalance {
                required: &asset.amount + &tx.data.fee,
                available: sender.balance.clone(),
            });
        }

        self.stake_for(asset, ctx.height)?;
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
        let asset = stake_asset(tx)?;
        let stake = self.stake_for(asset, ctx.height)?;

        {
            let wallet = registry.find_by_public_key(tx.sender());
            if wallet.stakes.contains_key(&stake.key()) {
                return Err(HandlerError::invariant(format!(
                    "stake {} already exists on {}",
                    stake.key(),
                    wallet.address
                )));
            }
            let remaining = &wallet.balance - &tx.data.fee - &stake.amount;
            if remaining.is_negative() && !ctx.replaying {
                return Err(HandlerError::invariant(format!(
                    "stake {} would leave {} with balance {}",
                    tx.id, wallet.address, remaining
                )));
            }
        }

        debit_sender(tx, ctx, registry)?;

        let wallet = registry.find_by_public_key(tx.sender());
        wallet.balance -= &stake.amount;
        wallet.stake_weight += &stake.weight;
        let vote = wallet.vote;
        let record = ExpirationRecord::for_stake(wallet.address, &stake);
        let weight = stake.weight.clone();
        wallet.stakes.insert(stake.key(), stake);

        shift_vote_weight(registry, vote, &weight);
        Ok(vec![ExpirationChange::Register(record)])
    }

    fn revert_for_sender(&self, tx: &Transaction, ctx: &TxContext, registry: &mut WalletRegistry) -> Result<Changes> {
        let asset = stake_asset(tx)?;

        let wallet = registry.find_by_public_key(tx.sender());
        let Some(stake) = wallet.stakes.remove(&asset.timestamp) else {
            return Err(HandlerError::invariant(format!(
                "reverting stake {} missing from {}",
                asset.timestamp, wallet.address
            )));
        };
        wallet.balance += &stake.amount;
        wallet.stake_weight -= &stake.weight;
        let vote = wallet.vote;
        let record = ExpirationRecord::for_stake(wallet.address, &stake);

        shift_vote_weight(registry, vote, &-stake.weight);
        credit_sender(tx, ctx, registry);
        Ok(vec![ExpirationChange::Release(record)])
    }

    fn emit_events(&self, tx: &Transaction, sink: &dyn EventSink) {
        sink.emit(Event::StakeRegistered {
            transaction: tx.data.clone(),
        });
    }
}
