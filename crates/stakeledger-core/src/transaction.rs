//! Transactions: the unit of state change.
//!
//! A transaction is signed [`TransactionData`] plus the content-addressed id.
//! The signature covers the canonical encoding of the data (see
//! [`crate::canonical`]); the id covers data and signature together.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_data_bytes;
use crate::crypto::{Blake3Hash, Keypair, PublicKey, Signature};
use crate::error::CoreError;
use crate::types::{Address, TransactionId, TransactionKey};

/// Current transaction format version.
pub const TRANSACTION_VERSION: u8 = 1;

/// Vote direction. The key names the delegate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteAsset {
    Vote(PublicKey),
    Unvote(PublicKey),
}

/// When an HTLC lock stops being claimable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtlcExpiration {
    /// Network time in seconds.
    Timestamp(i64),
    BlockHeight(u64),
}

/// Payload of a stake-create transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeCreateAsset {
    /// Lock duration in seconds; must be a configured stake level.
    pub duration: i64,
    /// Principal in base units.
    pub amount: BigInt,
    /// Creation time, also the stake key.
    pub timestamp: i64,
}

/// Type-specific transaction payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Asset {
    None,
    DelegateRegistration { username: String },
    Vote(VoteAsset),
    HtlcLock {
        secret_hash: Blake3Hash,
        expiration: HtlcExpiration,
    },
    StakeCreate(StakeCreateAsset),
    StakeRedeem { stake_key: i64 },
}

impl Asset {
    /// Whether this payload may accompany a transaction of `key`.
    pub fn fits(&self, key: TransactionKey) -> bool {
        match self {
            Asset::None => key == TransactionKey::TRANSFER,
            Asset::DelegateRegistration { .. } => key == TransactionKey::DELEGATE_REGISTRATION,
            Asset::Vote(_) => key == TransactionKey::VOTE,
            Asset::HtlcLock { .. } => key == TransactionKey::HTLC_LOCK,
            Asset::StakeCreate(_) => key == TransactionKey::STAKE_CREATE,
            Asset::StakeRedeem { .. } => key == TransactionKey::STAKE_REDEEM,
        }
    }
}

/// The signed portion of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub version: u8,
    pub key: TransactionKey,
    /// Network time in seconds.
    pub timestamp: i64,
    pub sender_public_key: PublicKey,
    pub fee: BigInt,
    pub amount: BigInt,
    pub recipient: Option<Address>,
    pub asset: Asset,
}

/// A signed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub data: TransactionData,
    pub signature: Signature,
}

impl Transaction {
    /// Compute the id from data and signature.
    pub fn compute_id(&self) -> TransactionId {
        compute_id(&self.data, &self.signature)
    }

    /// Verify the sender's signature over the canonical data.
    pub fn verify_signature(&self) -> Result<(), CoreError> {
        let message = canonical_data_bytes(&self.data);
        self.data.sender_public_key.verify(&message, &self.signature)
    }

    pub fn key(&self) -> TransactionKey {
        self.data.key
    }

    pub fn sender(&self) -> &PublicKey {
        &self.data.sender_public_key
    }

    pub fn sender_address(&self) -> Address {
        Address::from_public_key(&self.data.sender_public_key)
    }

    /// Amount plus fee, the most a transaction can debit from its sender.
    pub fn total_debit(&self) -> BigInt {
        &self.data.amount + &self.data.fee
    }
}

fn compute_id(data: &TransactionData, signature: &Signature) -> TransactionId {
    let data_bytes = canonical_data_bytes(data);
    TransactionId(Blake3Hash::hash_parts(&[&data_bytes, signature.as_bytes()]).0)
}

/// Builder for creating transactions.
pub struct TransactionBuilder {
    key: TransactionKey,
    timestamp: i64,
    fee: BigInt,
    amount: BigInt,
    recipient: Option<Address>,
    asset: Asset,
}

impl TransactionBuilder {
    /// Start building a transaction of an arbitrary type.
    pub fn new(key: TransactionKey, asset: Asset) -> Self {
        Self {
            key,
            timestamp: 0,
            fee: BigInt::from(0),
            amount: BigInt::from(0),
            recipient: None,
            asset,
        }
    }

    pub fn transfer(recipient: Address, amount: impl Into<BigInt>) -> Self {
        Self::new(TransactionKey::TRANSFER, Asset::None)
            .recipient(recipient)
            .amount(amount)
    }

    pub fn delegate_registration(username: impl Into<String>) -> Self {
        Self::new(
            TransactionKey::DELEGATE_REGISTRATION,
            Asset::DelegateRegistration {
                username: username.into(),
            },
        )
    }

    pub fn vote(delegate: PublicKey) -> Self {
        Self::new(TransactionKey::VOTE, Asset::Vote(VoteAsset::Vote(delegate)))
    }

    pub fn unvote(delegate: PublicKey) -> Self {
        Self::new(TransactionKey::VOTE, Asset::Vote(VoteAsset::Unvote(delegate)))
    }

    pub fn htlc_lock(
        recipient: Address,
        amount: impl Into<BigInt>,
        secret_hash: Blake3Hash,
        expiration: HtlcExpiration,
    ) -> Self {
        Self::new(
            TransactionKey::HTLC_LOCK,
            Asset::HtlcLock {
                secret_hash,
                expiration,
            },
        )
        .recipient(recipient)
        .amount(amount)
    }

    /// A stake of `amount` locked for `duration` seconds, keyed by `timestamp`.
    ///
    /// The transaction timestamp defaults to the stake timestamp.
    pub fn stake_create(duration: i64, amount: impl Into<BigInt>, timestamp: i64) -> Self {
        Self::new(
            TransactionKey::STAKE_CREATE,
            Asset::StakeCreate(StakeCreateAsset {
                duration,
                amount: amount.into(),
                timestamp,
            }),
        )
        .timestamp(timestamp)
    }

    pub fn stake_redeem(stake_key: i64) -> Self {
        Self::new(TransactionKey::STAKE_REDEEM, Asset::StakeRedeem { stake_key })
    }

    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    pub fn fee(mut self, fee: impl Into<BigInt>) -> Self {
        self.fee = fee.into();
        self
    }

    pub fn amount(mut self, amount: impl Into<BigInt>) -> Self {
        self.amount = amount.into();
        self
    }

    pub fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Build and sign the transaction.
    pub fn sign(self, keypair: &Keypair) -> Transaction {
        let data = TransactionData {
            version: TRANSACTION_VERSION,
            key: self.key,
            timestamp: self.timestamp,
            sender_public_key: keypair.public_key(),
            fee: self.fee,
            amount: self.amount,
            recipient: self.recipient,
            asset: self.asset,
        };

        let signature = keypair.sign(&canonical_data_bytes(&data));
        let id = compute_id(&data, &signature);

        Transaction {
            id,
            data,
            signature,
        }
    }
}
