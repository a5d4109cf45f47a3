//! Built-in transaction types.

pub mod delegate;
pub mod htlc;
pub mod stake_create;
pub mod stake_redeem;
pub mod transfer;
pub mod vote;

pub use delegate::DelegateRegistrationHandler;
pub use htlc::HtlcLockHandler;
pub use stake_create::StakeCreateHandler;
pub use stake_redeem::StakeRedeemHandler;
pub use transfer::TransferHandler;
pub use vote::VoteHandler;
