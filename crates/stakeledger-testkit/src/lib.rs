//! # stakeledger testkit
//!
//! Testing utilities for stakeledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: deterministic parties and a block builder that links
//!   heights, timestamps and parents
//! - **Generators**: proptest strategies for keys, stake durations and
//!   random sequences of ledger operations
//! - **Faults**: a store wrapper that fails expiration writes or queries
//!   on demand
//!
//! ## Test Fixtures
//!
//! ```rust
//! use stakeledger_testkit::fixtures::ChainFixture;
//!
//! let mut chain = ChainFixture::new(2);
//! let genesis = chain.genesis(1_000);
//! let next = chain.block(vec![]);
//! assert_eq!(next.header.previous_block, Some(genesis.header.id));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use stakeledger_testkit::generators::{ledger_op, op_transaction};
//!
//! proptest! {
//!     #[test]
//!     fn ops_build(ops in prop::collection::vec(ledger_op(4), 1..20)) {
//!         // turn each op into a transaction with op_transaction and apply it
//!     }
//! }
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::FlakyStore;
pub use fixtures::{funded_registry, multi_party_keypairs, ChainFixture, BLOCK_TIME, COIN, GENESIS_TIMESTAMP};
pub use generators::{ledger_op, op_transaction, LedgerOp};
