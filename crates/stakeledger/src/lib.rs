//! # stakeledger
//!
//! A deterministic ledger state engine. Applies blocks of signed
//! transactions to an in-memory wallet registry, keeps stake weight and
//! delegate vote balances consistent, and halves matured stakes at round
//! boundaries.
//!
//! ## Overview
//!
//! - **Wallets**: balances, stakes, votes and attributes, indexed by
//!   address, public key and delegate username
//! - **Handlers**: one per transaction type, each with an exact inverse
//! - **Blocks**: applied all-or-nothing, reverted from the tip
//! - **Pool**: speculative admission with per-sender strikes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stakeledger::{Ledger, LedgerConfig};
//! use stakeledger::core::NetworkConfig;
//! use stakeledger::store::SqliteStore;
//!
//! async fn example() -> stakeledger::Result<()> {
//!     let store = SqliteStore::open("ledger.db")?;
//!     let mut ledger = Ledger::new(store, NetworkConfig::devnet(), LedgerConfig::default())?;
//!
//!     // Rebuild wallet state from persisted history
//!     let report = ledger.bootstrap().await?;
//!     println!("replayed {} transactions", report.replayed);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `stakeledger::core` - Wallets, transactions, blocks, rounds
//! - `stakeledger::store` - Persistence traits, SQLite and in-memory stores
//! - `stakeledger::handlers` - Transaction handlers, sweep and events

pub mod clock;
pub mod error;
pub mod ledger;
pub mod pool;

pub use stakeledger_core as core;
pub use stakeledger_handlers as handlers;
pub use stakeledger_store as store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{LedgerError, PoolError, Result};
pub use ledger::{BlockReport, BootstrapReport, Ledger, LedgerConfig};
pub use pool::{PoolConfig, TransactionPool};

pub use stakeledger_core::{
    Address, BigInt, Block, BlockHeader, Keypair, NetworkConfig, PublicKey, Transaction,
    TransactionBuilder, Wallet, WalletRegistry,
};
pub use stakeledger_handlers::{Event, EventSink};
