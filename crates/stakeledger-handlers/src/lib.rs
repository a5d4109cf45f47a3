//! # stakeledger handlers
//!
//! Per-type transaction logic for the ledger: validation, application,
//! exact reversal and history replay, plus the stake expiration sweep.
//!
//! ## Key Types
//!
//! - [`TransactionHandler`] - The contract every transaction type implements
//! - [`HandlerRegistry`] - Lookup by (type, type-group), in registration order
//! - [`ExpirationSweep`] - Halves matured stakes at round boundaries
//! - [`Event`] / [`EventSink`] - Notifications emitted after state changes
//!
//! ## Design Notes
//!
//! - **No I/O in apply**: handlers mutate the registry and return
//!   [`ExpirationChange`]s; the caller flushes them once a block is final
//! - **Exact reversal**: `revert(apply(s)) == s` for every type
//! - **Pool policy is separate**: `can_enter_pool` never affects blocks

pub mod context;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handler;
pub mod handlers;
pub mod pool;
pub mod sweep;

pub use context::{flush_change, BootstrapContext, Changes, ExpirationChange, TxContext};
pub use dispatch::HandlerRegistry;
pub use error::{HandlerError, Result};
pub use events::{BroadcastSink, Event, EventSink, NullSink, RecordingSink};
pub use handler::{base_can_be_applied, credit_sender, debit_sender, shift_vote_weight, TransactionHandler};
pub use handlers::{
    DelegateRegistrationHandler, HtlcLockHandler, StakeCreateHandler, StakeRedeemHandler,
    TransferHandler, VoteHandler,
};
pub use pool::{one_per_sender, PoolRejection, PoolView};
pub use sweep::{ExpirationSweep, SweepReport};
