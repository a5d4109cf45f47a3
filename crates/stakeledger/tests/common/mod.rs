//! Shared setup for ledger integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use stakeledger::core::{Block, NetworkConfig};
use stakeledger::handlers::RecordingSink;
use stakeledger::store::{BlockWriter, LedgerStore};
use stakeledger::{FixedClock, Ledger, LedgerConfig};
use stakeledger_testkit::GENESIS_TIMESTAMP;

/// Stake duration with a 2x multiplier on the test network.
pub const SHORT_STAKE: i64 = 100;
/// Stake duration with a 1.5x multiplier on the test network.
pub const LONG_STAKE: i64 = 400;

/// Four delegates per round, so rounds open at heights 1, 5, 9, 13...
pub const TEST_NETWORK: &str = r#"{
    "epoch": 0,
    "milestones": [
        { "height": 1, "activeDelegates": 4, "blockTime": 8,
          "stakeLevels": { "100": 2, "400": 1.5 } }
    ]
}"#;

pub fn network() -> NetworkConfig {
    NetworkConfig::from_json(TEST_NETWORK).expect("test network parses")
}

/// A ledger on the test network with a recording sink and a clock parked
/// at genesis.
pub fn ledger<S: LedgerStore>(store: S) -> (Ledger<S>, Arc<RecordingSink>, Arc<FixedClock>) {
    ledger_with(store, LedgerConfig::default())
}

pub fn ledger_with<S: LedgerStore>(
    store: S,
    config: LedgerConfig,
) -> (Ledger<S>, Arc<RecordingSink>, Arc<FixedClock>) {
    let sink = Arc::new(RecordingSink::new());
    let clock = Arc::new(FixedClock::new(GENESIS_TIMESTAMP));
    let ledger = Ledger::new(store, network(), config)
        .expect("ledger builds")
        .with_event_sink(sink.clone())
        .with_clock(clock.clone());
    (ledger, sink, clock)
}

/// Apply `block` and persist it, as a node would.
pub async fn commit<S: LedgerStore + BlockWriter>(ledger: &mut Ledger<S>, block: &Block) {
    ledger.apply_block(block).await.expect("block applies");
    ledger.store().save_block(block).await.expect("block persists");
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
