//! # stakeledger store
//!
//! Persistence collaborators for the ledger. Provides the trait-based
//! interfaces the ledger consumes with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`TransactionHistory`] - Confirmed transactions by type, in chain order
//! - [`ExpirationStore`] - Stakes awaiting their halving
//! - [`ChainTip`] - Confirmed block headers, including the tip
//! - [`BlockWriter`] - Appends and removes blocks
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Design Notes
//!
//! - **Ordered sweeps**: due expirations come back sorted so every node
//!   processes them identically
//! - **Idempotent saves**: saving an existing expiration record is a no-op
//! - **Tip discipline**: blocks are appended and removed only at the tip

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    BlockWriter, ChainTip, ExpirationStore, LedgerStore, TransactionHistory, TransactionRecord,
};
