//! Error types for stakeledger core.

use num_bigint::BigInt;
use thiserror::Error;

use crate::crypto::PublicKey;
use crate::types::TransactionKey;

/// Core errors: encoding, keys, configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("invalid milestone configuration: {0}")]
    InvalidMilestones(String),

    #[error(
        "milestone at height {height} does not start a round: span of {span} blocks is not a multiple of {active_delegates} delegates"
    )]
    MisalignedMilestone {
        height: u64,
        span: u64,
        active_delegates: u32,
    },

    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Validation errors raised by structural checks and by handlers'
/// `can_be_applied`.
///
/// Each variant is a distinct signal. The pool uses
/// [`ValidationError::is_self_correcting`] to decide whether a rejection
/// counts against the sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    // ─────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("transaction id does not match its content")]
    IdMismatch,

    #[error("unsupported transaction version: {0}")]
    UnsupportedVersion(u8),

    #[error("no handler registered for transaction type {0}")]
    UnsupportedType(TransactionKey),

    #[error("asset does not match transaction type {0}")]
    AssetMismatch(TransactionKey),

    #[error("structural error: {0}")]
    StructuralError(String),

    // ─────────────────────────────────────────────────────────────────────
    // Balances and senders
    // ─────────────────────────────────────────────────────────────────────
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: BigInt, available: BigInt },

    #[error("sender public key does not match wallet")]
    SenderMismatch,

    #[error("transaction requires a recipient")]
    MissingRecipient,

    // ─────────────────────────────────────────────────────────────────────
    // Stakes
    // ─────────────────────────────────────────────────────────────────────
    #[error("stake key {0} already exists on this wallet")]
    DuplicateStakeKey(i64),

    #[error("stake timestamp {timestamp} is more than {window}s away from {reference}")]
    StakeTimestampOutOfWindow {
        timestamp: i64,
        reference: i64,
        window: i64,
    },

    #[error("stake duration {0} has no configured multiplier")]
    StakeDurationInvalid(i64),

    #[error("stake amount {0} is not a positive whole number of base units")]
    StakeAmountNotInteger(BigInt),

    #[error("stake {0} not found")]
    StakeNotFound(i64),

    #[error("stake {0} was already redeemed")]
    StakeAlreadyRedeemed(i64),

    #[error("stake {key} is not redeemable before {redeemable_at}")]
    StakeNotYetRedeemable { key: i64, redeemable_at: i64 },

    // ─────────────────────────────────────────────────────────────────────
    // Delegates and votes
    // ─────────────────────────────────────────────────────────────────────
    #[error("wallet is already a delegate")]
    WalletAlreadyDelegate,

    #[error("invalid delegate username: {0:?}")]
    InvalidUsername(String),

    #[error("delegate username {0:?} is taken")]
    UsernameTaken(String),

    #[error("wallet has already voted")]
    AlreadyVoted,

    #[error("wallet has not voted")]
    NoVote,

    #[error("unvote does not match the current vote")]
    UnvoteMismatch,

    #[error("vote target {0:?} is not a delegate")]
    VotedForNonDelegate(PublicKey),

    // ─────────────────────────────────────────────────────────────────────
    // Locks
    // ─────────────────────────────────────────────────────────────────────
    #[error("lock expiration is not in the future")]
    HtlcLockExpired,
}

impl ValidationError {
    /// Whether the rejection can clear up on its own (clock drift), in
    /// which case the sender must not be penalized.
    pub fn is_self_correcting(&self) -> bool {
        matches!(self, ValidationError::StakeTimestampOutOfWindow { .. })
    }
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            other => ValidationError::StructuralError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timestamp_skew_is_self_correcting() {
        let skew = ValidationError::StakeTimestampOutOfWindow {
            timestamp: 1000,
            reference: 0,
            window: 120,
        };
        assert!(skew.is_self_correcting());
        assert!(!ValidationError::DuplicateStakeKey(1).is_self_correcting());
        assert!(!ValidationError::StakeAmountNotInteger(BigInt::from(5)).is_self_correcting());
    }

    #[test]
    fn test_core_error_conversion() {
        assert_eq!(
            ValidationError::from(CoreError::InvalidSignature),
            ValidationError::SignatureFailed
        );
        assert!(matches!(
            ValidationError::from(CoreError::DecodingError("x".into())),
            ValidationError::StructuralError(_)
        ));
    }
}
