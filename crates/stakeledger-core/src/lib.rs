//! # stakeledger core
//!
//! Pure primitives for the stakeledger state engine: wallets, transactions,
//! the wallet registry, round arithmetic and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Wallet`] - A single account's mutable state
//! - [`WalletRegistry`] - Multi-index wallet store; clone for a speculative view
//! - [`Transaction`] - Signed state change, dispatched by [`TransactionKey`]
//! - [`StakeObject`] - A time-locked deposit with decaying vote weight
//! - [`RoundCalculator`] - Height to round mapping over [`Milestones`]
//!
//! ## Canonicalization
//!
//! Transaction data is encoded with deterministic CBOR. See [`canonical`].

pub mod block;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod error;
pub mod registry;
pub mod round;
pub mod transaction;
pub mod types;
pub mod validation;
pub mod wallet;

pub use block::{Block, BlockHeader, GENESIS_HEIGHT};
pub use canonical::canonical_data_bytes;
pub use config::{Milestone, Milestones, Multiplier, NetworkConfig};
pub use crypto::{Blake3Hash, Keypair, PublicKey, Signature};
pub use error::{CoreError, ValidationError};
pub use registry::WalletRegistry;
pub use round::{RoundCalculator, RoundInfo};
pub use transaction::{
    Asset, HtlcExpiration, StakeCreateAsset, Transaction, TransactionBuilder, TransactionData,
    VoteAsset,
};
pub use types::{Address, TransactionId, TransactionKey};
pub use validation::{validate_transaction, validate_transaction_structure};
pub use wallet::{Attribute, ExpirationRecord, StakeObject, StakeStatus, Wallet, HTLC_LOCKED_BALANCE};

/// Re-exported so downstream crates share one big-integer type.
pub use num_bigint::BigInt;
