//! Randomized block sequences: revert restores state and bootstrap agrees
//! with live application.

use std::sync::Arc;

use proptest::prelude::*;
use stakeledger::core::{Blake3Hash, NetworkConfig};
use stakeledger::store::{BlockWriter, MemoryStore};
use stakeledger::{FixedClock, Ledger, LedgerConfig};
use stakeledger_testkit::{ledger_op, op_transaction, ChainFixture, LedgerOp, BLOCK_TIME, GENESIS_TIMESTAMP};

const PARTIES: usize = 4;

struct Outcome {
    genesis: Blake3Hash,
    live: Blake3Hash,
    bootstrapped: Blake3Hash,
    reverted: Blake3Hash,
    blocks: usize,
}

fn ledger(store: Arc<MemoryStore>, clock: Arc<FixedClock>) -> Ledger<Arc<MemoryStore>> {
    Ledger::new(store, NetworkConfig::devnet(), LedgerConfig::default())
        .unwrap()
        .with_clock(clock)
}

/// One block per op the pool accepts, then bootstrap a replica, then
/// revert every block.
async fn run(ops: &[LedgerOp]) -> Outcome {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(GENESIS_TIMESTAMP));
    let mut live = ledger(store.clone(), clock.clone());
    let mut chain = ChainFixture::new(PARTIES);

    let genesis_block = chain.genesis(1000);
    live.apply_block(&genesis_block).await.unwrap();
    store.save_block(&genesis_block).await.unwrap();
    let genesis = live.registry().state_hash().unwrap();

    let mut blocks = Vec::new();
    for (seq, op) in ops.iter().enumerate() {
        let now = chain.timestamp() + BLOCK_TIME;
        clock.set(now);
        let Some(tx) = op_transaction(op, &chain.parties, live.registry(), now, seq as i64) else {
            continue;
        };
        if live.submit(tx.clone()).is_err() {
            continue;
        }
        let block = chain.block_at(now, vec![tx]);
        live.apply_block(&block).await.unwrap();
        store.save_block(&block).await.unwrap();
        blocks.push(block);
    }
    let live_hash = live.registry().state_hash().unwrap();

    let mut replica = ledger(store.clone(), clock);
    replica.bootstrap().await.unwrap();
    let bootstrapped = replica.registry().state_hash().unwrap();

    for block in blocks.iter().rev() {
        live.revert_block(block).await.unwrap();
    }

    Outcome {
        genesis,
        live: live_hash,
        bootstrapped,
        reverted: live.registry().state_hash().unwrap(),
        blocks: blocks.len(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_blocks_revert_and_replay(ops in prop::collection::vec(ledger_op(PARTIES), 1..25)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let outcome = runtime.block_on(run(&ops));

        prop_assert_eq!(outcome.bootstrapped, outcome.live);
        prop_assert_eq!(outcome.reverted, outcome.genesis);
        if outcome.blocks == 0 {
            prop_assert_eq!(outcome.live, outcome.genesis);
        }
    }
}
