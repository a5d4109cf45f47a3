//! Stake expiration sweep.
//!
//! Once per round the ledger asks the expiration store for every record due
//! before the block timestamp and halves the matching stakes. Each record is
//! consumed exactly once, whether or not its stake was still there to halve.

use stakeledger_core::{BlockHeader, ExpirationRecord, PublicKey, WalletRegistry};
use stakeledger_store::ExpirationStore;

use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::handler::shift_vote_weight;

/// Outcome of one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due records read from the store.
    pub examined: usize,
    /// Stakes whose weight was halved.
    pub halved: usize,
    /// Records consumed without touching a stake (redeemed, reverted, or
    /// already halved).
    pub stale: usize,
}

pub struct ExpirationSweep;

impl ExpirationSweep {
    /// Halve every stake due before `block.timestamp`.
    ///
    /// Records are processed in store order and each deletion completes
    /// before the next record is looked at.
    pub async fn run(
        store: &dyn ExpirationStore,
        registry: &mut WalletRegistry,
        block: &BlockHeader,
        sink: &dyn EventSink,
    ) -> Result<SweepReport> {
        let (records, count) = store.find_and_count(block.timestamp).await?;
        let mut report = SweepReport {
            examined: count,
            ..SweepReport::default()
        };

        for record in &records {
            match Self::halve(registry, record, block.timestamp) {
                Some(public_key) => {
                    tracing::info!(
                        address = %record.address,
                        stake_key = record.stake_key,
                        height = block.height,
                        "stake weight halved"
                    );
                    sink.emit(Event::StakeReleased {
                        address: record.address,
                        public_key,
                        stake_key: record.stake_key,
                        block: *block,
                    });
                    report.halved += 1;
                }
                None => {
                    tracing::debug!(
                        address = %record.address,
                        stake_key = record.stake_key,
                        "stale expiration record"
                    );
                    report.stale += 1;
                }
            }
            store.remove(record).await?;
        }

        Ok(report)
    }

    /// Halve the stake `record` points at, if it is still due.
    ///
    /// Returns the owner's public key when a stake was halved.
    pub(crate) fn halve(
        registry: &mut WalletRegistry,
        record: &ExpirationRecord,
        now: i64,
    ) -> Option<Option<PublicKey>> {
        let wallet = registry.get_mut(&record.address)?;
        let stake = wallet.stakes.get_mut(&record.stake_key)?;
        if stake.redeemable_timestamp != record.redeemable_timestamp || !stake.is_due(now) {
            return None;
        }

        let removed = stake.halve();
        wallet.stake_weight -= &removed;
        let vote = wallet.vote;
        let public_key = wallet.public_key;

        shift_vote_weight(registry, vote, &-removed);
        Some(public_key)
    }

    /// Bring replayed stakes in line with the chain tip after bootstrap.
    ///
    /// A stake that is due at `tip_timestamp` but has no expiration record
    /// was consumed by an earlier sweep, or never recorded because history
    /// was replayed into an empty store. Either way it is halved now.
    ///
    /// # Returns
    ///
    /// The number of stakes halved.
    pub async fn settle_after_replay(
        store: &dyn ExpirationStore,
        registry: &mut WalletRegistry,
        tip_timestamp: i64,
    ) -> Result<usize> {
        let due: Vec<ExpirationRecord> = registry
            .iter()
            .flat_map(|wallet| {
                wallet
                    .stakes
                    .values()
                    .filter(|stake| stake.is_due(tip_timestamp))
                    .map(|stake| ExpirationRecord::for_stake(wallet.address, stake))
            })
            .collect();

        let mut halved = 0;
        for record in due {
            let pending = store
                .find_one(&record.address, record.stake_key, record.redeemable_timestamp)
                .await?;
            if pending.is_some() {
                continue;
            }
            if Self::halve(registry, &record, tip_timestamp).is_some() {
                halved += 1;
            }
        }

        if halved > 0 {
            tracing::info!(halved, tip_timestamp, "halved stakes already due at the tip");
        }
        Ok(halved)
    }
}
