//! Block application, rollback and reversal.

mod common;

use std::sync::Arc;

use common::{commit, ledger, ledger_with, SHORT_STAKE};
use stakeledger::core::{TransactionBuilder, ValidationError};
use stakeledger::store::{MemoryStore, StoreError};
use stakeledger::{LedgerConfig, LedgerError};
use stakeledger_testkit::{ChainFixture, FlakyStore, COIN};

#[tokio::test]
async fn test_failed_transaction_rolls_back_whole_block() {
    let store = Arc::new(MemoryStore::new());
    let (mut ledger, sink, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(3);
    let genesis = chain.genesis(100);
    commit(&mut ledger, &genesis).await;
    let before = ledger.registry().state_hash().unwrap();
    sink.clear();

    // Fees put the valid transactions first; the overspend comes last.
    let stake_at = chain.timestamp() + 8;
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 10 * COIN, stake_at)
        .fee(2)
        .sign(chain.keypair(0));
    let transfer = TransactionBuilder::transfer(chain.address(2), 5 * COIN)
        .fee(1)
        .sign(chain.keypair(1));
    let overspend = TransactionBuilder::transfer(chain.address(0), 5_000 * COIN)
        .sign(chain.keypair(2));
    let overspend_id = overspend.id;
    let block = chain.block_at(stake_at, vec![overspend, transfer, stake]);
    assert_eq!(block.transactions[2].id, overspend_id);

    let err = ledger.apply_block(&block).await.unwrap_err();
    match err {
        LedgerError::Rejected { id, reason } => {
            assert_eq!(id, overspend_id);
            assert!(matches!(reason, ValidationError::InsufficientBalance { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(ledger.registry().state_hash().unwrap(), before);
    assert_eq!(ledger.tip(), Some(&genesis.header));
    assert_eq!(store.expiration_count().unwrap(), 0);
    assert!(sink.events().is_empty());

    // The same chain continues once the bad transaction is left out.
    chain.follow(&genesis.header);
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 10 * COIN, stake_at)
        .fee(2)
        .sign(chain.keypair(0));
    commit(&mut ledger, &chain.block_at(stake_at, vec![stake])).await;
    assert_eq!(store.expiration_count().unwrap(), 1);
}

#[tokio::test]
async fn test_store_write_failure_rolls_back_block() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let (mut ledger, _, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(1);
    let genesis = chain.genesis(1000);
    commit(&mut ledger, &genesis).await;
    let before = ledger.registry().state_hash().unwrap();

    let stake_at = chain.timestamp() + 8;
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 100 * COIN, stake_at)
        .sign(chain.keypair(0));
    let block = chain.block_at(stake_at, vec![stake]);

    store.fail_writes_after(0);
    let err = ledger.apply_block(&block).await.unwrap_err();
    assert!(matches!(err, LedgerError::Store(StoreError::Unavailable(_))));
    assert_eq!(ledger.registry().state_hash().unwrap(), before);
    assert_eq!(ledger.tip(), Some(&genesis.header));
    assert_eq!(store.inner().expiration_count().unwrap(), 0);

    store.heal();
    commit(&mut ledger, &block).await;
    assert_eq!(store.inner().expiration_count().unwrap(), 1);
}

#[tokio::test]
async fn test_sweep_failure_keeps_block_applied() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let (mut ledger, _, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(1);
    commit(&mut ledger, &chain.genesis(1000)).await;

    let stake_at = chain.timestamp() + 8;
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 100 * COIN, stake_at)
        .sign(chain.keypair(0));
    commit(&mut ledger, &chain.block_at(stake_at, vec![stake])).await;

    let mut blocks = chain.empty_blocks_until(17);
    let round_block = blocks.pop().unwrap();
    for block in &blocks {
        commit(&mut ledger, block).await;
    }

    store.fail_queries(true);
    let err = ledger.apply_block(&round_block).await.unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));
    assert_eq!(ledger.tip().map(|h| h.height), Some(17));
    let wallet = ledger.registry().get_by_public_key(&chain.public_key(0)).unwrap();
    assert!(!wallet.stakes[&stake_at].halved);

    // The record survives and the next round picks it up.
    store.heal();
    for block in chain.empty_blocks_until(21) {
        ledger.apply_block(&block).await.unwrap();
    }
    let wallet = ledger.registry().get_by_public_key(&chain.public_key(0)).unwrap();
    assert!(wallet.stakes[&stake_at].halved);
    assert_eq!(store.inner().expiration_count().unwrap(), 0);
}

#[tokio::test]
async fn test_revert_block_restores_state_and_pool() {
    let store = Arc::new(MemoryStore::new());
    let (mut ledger, _, _) = ledger(store.clone());
    let mut chain = ChainFixture::new(2);
    let genesis = chain.genesis(1000);
    commit(&mut ledger, &genesis).await;
    let before = ledger.registry().state_hash().unwrap();

    let stake_at = chain.timestamp() + 8;
    let stake = TransactionBuilder::stake_create(SHORT_STAKE, 100 * COIN, stake_at)
        .sign(chain.keypair(0));
    let transfer = TransactionBuilder::transfer(chain.address(0), 25 * COIN)
        .sign(chain.keypair(1));
    let ids = [stake.id, transfer.id];
    let block = chain.block_at(stake_at, vec![stake, transfer]);

    ledger.apply_block(&block).await.unwrap();
    assert_eq!(store.expiration_count().unwrap(), 1);
    assert!(ledger.pool().is_empty());

    ledger.revert_block(&block).await.unwrap();
    assert_eq!(ledger.registry().state_hash().unwrap(), before);
    assert_eq!(ledger.tip(), Some(&genesis.header));
    assert_eq!(store.expiration_count().unwrap(), 0);
    for id in &ids {
        assert!(ledger.pool().contains(id), "reverted transaction back in pool");
    }

    // Re-applying the same block is accepted.
    ledger.apply_block(&block).await.unwrap();
    assert_eq!(ledger.tip(), Some(&block.header));
}

#[tokio::test]
async fn test_blocks_must_extend_tip() {
    let store = Arc::new(MemoryStore::new());
    let (mut ledger, _, _) = ledger(store);
    let mut chain = ChainFixture::new(1);
    let genesis = chain.genesis(1);

    // Nothing applied yet: only genesis fits.
    let orphan = chain.block(vec![]);
    let err = ledger.apply_block(&orphan).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotOnTip { height: 2, tip: None }));

    commit(&mut ledger, &genesis).await;
    let err = ledger.apply_block(&genesis).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotOnTip { height: 1, tip: Some(1) }));

    // Only the tip can be reverted.
    let err = ledger.revert_block(&orphan).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotOnTip { .. }));
}

#[tokio::test]
async fn test_revert_limited_to_retained_history() {
    let store = Arc::new(MemoryStore::new());
    let config = LedgerConfig {
        max_reorg_depth: 1,
        ..LedgerConfig::default()
    };
    let (mut ledger, _, _) = ledger_with(store, config);
    let mut chain = ChainFixture::new(1);
    commit(&mut ledger, &chain.genesis(1)).await;
    let second = chain.block(vec![]);
    commit(&mut ledger, &second).await;
    let third = chain.block(vec![]);
    commit(&mut ledger, &third).await;

    ledger.revert_block(&third).await.unwrap();
    assert_eq!(ledger.tip(), Some(&second.header));

    let err = ledger.revert_block(&second).await.unwrap_err();
    assert!(matches!(err, LedgerError::ReorgTooDeep { max_depth: 1 }));
    assert_eq!(ledger.tip(), Some(&second.header));
}
