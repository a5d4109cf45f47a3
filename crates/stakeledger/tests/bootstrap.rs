//! Rebuilding state from persisted history must match live state.

mod common;

use std::sync::Arc;

use common::{commit, ledger, LONG_STAKE, SHORT_STAKE};
use stakeledger::core::{BigInt, Blake3Hash, HtlcExpiration, TransactionBuilder, HTLC_LOCKED_BALANCE};
use stakeledger::store::{BlockWriter, LedgerStore, MemoryStore, SqliteStore};
use stakeledger::{Ledger, LedgerError};
use stakeledger_testkit::{ChainFixture, COIN};

/// Bootstrap a fresh ledger over `store` and check it agrees with `live`.
async fn assert_bootstrap_matches<S: LedgerStore>(live: &Ledger<S>, store: S) {
    let (mut replica, _, _) = ledger(store);
    let report = replica.bootstrap().await.expect("bootstrap succeeds");
    assert_eq!(report.tip, live.tip().map(|h| h.height));
    assert_eq!(
        replica.registry().state_hash().unwrap(),
        live.registry().state_hash().unwrap(),
        "bootstrapped state diverged at height {:?}",
        report.tip
    );
}

#[tokio::test]
async fn test_bootstrap_matches_live_state() {
    let store = Arc::new(MemoryStore::new());
    let (mut live, _, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(3);
    let (staker, delegate, locker) = (0, 1, 2);

    commit(&mut live, &chain.genesis(1000)).await;
    assert_bootstrap_matches(&live, store.clone()).await;

    // Height 2: a delegate and an HTLC lock.
    let register = TransactionBuilder::delegate_registration("alpha").sign(chain.keypair(delegate));
    let lock = TransactionBuilder::htlc_lock(
        chain.address(staker),
        50 * COIN,
        Blake3Hash::hash(b"secret"),
        HtlcExpiration::BlockHeight(1_000),
    )
    .sign(chain.keypair(locker));
    commit(&mut live, &chain.block(vec![register, lock])).await;
    let locked = live
        .registry()
        .get_by_public_key(&chain.public_key(locker))
        .unwrap()
        .attribute_amount(HTLC_LOCKED_BALANCE);
    assert_eq!(locked, BigInt::from(50 * COIN));

    // Height 3: a vote and the first stake.
    let first_stake = chain.timestamp() + 8;
    let vote = TransactionBuilder::vote(chain.public_key(delegate)).sign(chain.keypair(staker));
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 100 * COIN, first_stake)
        .sign(chain.keypair(staker));
    commit(&mut live, &chain.block_at(first_stake, vec![vote, stake])).await;

    // Height 4: a long stake and one that is redeemed before any sweep.
    let second_stake = chain.timestamp() + 8;
    let long = TransactionBuilder::stake_create(LONG_STAKE, 200 * COIN, second_stake)
        .sign(chain.keypair(delegate));
    let short = TransactionBuilder::stake_create(SHORT_STAKE, 10 * COIN, second_stake)
        .sign(chain.keypair(locker));
    commit(&mut live, &chain.block_at(second_stake, vec![long, short])).await;
    assert_bootstrap_matches(&live, store.clone()).await;

    // Up to height 16 the first stake is past due but no round has swept it.
    for block in chain.empty_blocks_until(16) {
        commit(&mut live, &block).await;
    }
    assert!(chain.timestamp() > first_stake + SHORT_STAKE);
    assert_bootstrap_matches(&live, store.clone()).await;

    // Height 17 opens a round: the redeem lands first, then the sweep.
    let redeem = TransactionBuilder::stake_redeem(second_stake)
        .timestamp(second_stake + SHORT_STAKE)
        .sign(chain.keypair(locker));
    commit(&mut live, &chain.block(vec![redeem])).await;
    let staker_wallet = live.registry().get_by_public_key(&chain.public_key(staker)).unwrap();
    assert!(staker_wallet.stakes[&first_stake].halved);
    assert_bootstrap_matches(&live, store.clone()).await;

    // Height 18: a fresh stake after the sweep.
    let third_stake = chain.timestamp() + 8;
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 50 * COIN, third_stake)
        .sign(chain.keypair(staker));
    commit(&mut live, &chain.block_at(third_stake, vec![stake])).await;

    let pending = store.expiration_count().unwrap();
    assert_bootstrap_matches(&live, store.clone()).await;
    assert_eq!(store.expiration_count().unwrap(), pending);
    assert_eq!(
        live.registry()
            .get_by_public_key(&chain.public_key(delegate))
            .unwrap()
            .vote_balance,
        live.registry()
            .get_by_public_key(&chain.public_key(staker))
            .unwrap()
            .stake_weight
    );
}

#[tokio::test]
async fn test_bootstrap_keeps_halving_of_redeemed_stake() {
    let store = Arc::new(MemoryStore::new());
    let (mut live, _, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(1);
    let staker = chain.public_key(0);

    commit(&mut live, &chain.genesis(1000)).await;
    let created_at = chain.timestamp() + 8;
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 100 * COIN, created_at)
        .sign(chain.keypair(0));
    commit(&mut live, &chain.block_at(created_at, vec![stake])).await;
    for block in chain.empty_blocks_until(17) {
        commit(&mut live, &block).await;
    }
    assert!(live.registry().get_by_public_key(&staker).unwrap().stakes[&created_at].halved);

    // Height 18: redeemed after the round at 17 swept it.
    let redeem = TransactionBuilder::stake_redeem(created_at)
        .timestamp(created_at + SHORT_STAKE)
        .sign(chain.keypair(0));
    commit(&mut live, &chain.block(vec![redeem])).await;
    let archived = &live.registry().get_by_public_key(&staker).unwrap().redeemed_stakes[&created_at];
    assert!(archived.halved);
    assert_eq!(archived.weight, BigInt::from(100 * COIN));

    assert_bootstrap_matches(&live, store.clone()).await;
    assert_eq!(store.expiration_count().unwrap(), 0);
}

#[tokio::test]
async fn test_bootstrap_from_reopened_sqlite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    let mut chain = ChainFixture::new(1);

    let (expected_hash, created_at) = {
        let store = Arc::new(SqliteStore::open(&path)?);
        let (mut live, _, _) = ledger(store);
        commit(&mut live, &chain.genesis(1000)).await;
        let created_at = chain.timestamp() + 8;
        let stake = TransactionBuilder::stake_create(SHORT_STAKE, 100 * COIN, created_at)
            .sign(chain.keypair(0));
        commit(&mut live, &chain.block_at(created_at, vec![stake])).await;
        for block in chain.empty_blocks_until(17) {
            commit(&mut live, &block).await;
        }
        (live.registry().state_hash()?, created_at)
    };

    let store = Arc::new(SqliteStore::open(&path)?);
    let (mut replica, _, _) = ledger(store);
    let report = replica.bootstrap().await?;

    assert_eq!(report.tip, Some(17));
    assert_eq!(report.halved, 1);
    assert_eq!(replica.registry().state_hash()?, expected_hash);
    let wallet = replica
        .registry()
        .get_by_public_key(&chain.public_key(0))
        .ok_or_else(|| anyhow::anyhow!("staker missing after bootstrap"))?;
    assert!(wallet.stakes[&created_at].halved);
    assert_eq!(wallet.stake_weight, BigInt::from(100 * COIN));

    // The rebuilt ledger keeps extending the persisted chain.
    commit(&mut replica, &chain.block(vec![])).await;
    assert_eq!(replica.tip().map(|h| h.height), Some(18));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_rejects_overspent_history() {
    let store = Arc::new(MemoryStore::new());
    let (mut live, _, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(2);
    commit(&mut live, &chain.genesis(10)).await;

    // Persisted without going through the ledger.
    let overspend = TransactionBuilder::transfer(chain.address(1), 20 * COIN)
        .timestamp(chain.timestamp())
        .sign(chain.keypair(0));
    store.save_block(&chain.block(vec![overspend])).await.unwrap();

    let (mut replica, _, _) = ledger(store);
    let err = replica.bootstrap().await.unwrap_err();
    assert!(matches!(err, LedgerError::CorruptState(_)), "got {err}");
    assert!(replica.tip().is_none());
}
