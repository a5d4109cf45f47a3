//! Wallets and stakes.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::PublicKey;
use crate::types::Address;

/// Attribute key for the balance held by unsettled HTLC locks.
pub const HTLC_LOCKED_BALANCE: &str = "htlc.lockedBalance";

/// A value in a wallet's generic attribute bag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribute {
    Amount(BigInt),
    Text(String),
    Flag(bool),
}

/// Lifecycle of a stake, derived from its flags and the current time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakeStatus {
    Created,
    /// Past `redeemable_timestamp` but not yet halved by a sweep.
    Eligible,
    Halved,
    Redeemed,
}

/// A time-locked deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeObject {
    /// Principal in base units. Never decays.
    pub amount: BigInt,
    /// Vote-weight contribution.
    pub weight: BigInt,
    pub duration: i64,
    /// Creation time; the stake key.
    pub timestamp: i64,
    pub redeemable_timestamp: i64,
    pub halved: bool,
    pub redeemed: bool,
}

impl StakeObject {
    pub fn new(amount: BigInt, weight: BigInt, duration: i64, timestamp: i64) -> Self {
        Self {
            amount,
            weight,
            duration,
            timestamp,
            redeemable_timestamp: timestamp + duration,
            halved: false,
            redeemed: false,
        }
    }

    pub fn key(&self) -> i64 {
        self.timestamp
    }

    pub fn status(&self, now: i64) -> StakeStatus {
        if self.redeemed {
            StakeStatus::Redeemed
        } else if self.halved {
            StakeStatus::Halved
        } else if now >= self.redeemable_timestamp {
            StakeStatus::Eligible
        } else {
            StakeStatus::Created
        }
    }

    /// Whether a sweep at `block_timestamp` should halve this stake.
    pub fn is_due(&self, block_timestamp: i64) -> bool {
        !self.halved && !self.redeemed && block_timestamp > self.redeemable_timestamp
    }

    /// Halve the weight (floor) and set the one-way flag. Returns the weight
    /// that was removed.
    pub fn halve(&mut self) -> BigInt {
        let halved = &self.weight / 2;
        let removed = &self.weight - &halved;
        self.weight = halved;
        self.halved = true;
        removed
    }
}

/// A durable pointer to a stake awaiting its halving.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpirationRecord {
    pub redeemable_timestamp: i64,
    pub address: Address,
    pub stake_key: i64,
}

impl ExpirationRecord {
    pub fn for_stake(address: Address, stake: &StakeObject) -> Self {
        Self {
            redeemable_timestamp: stake.redeemable_timestamp,
            address,
            stake_key: stake.key(),
        }
    }
}

/// A single account's mutable state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: Address,
    pub public_key: Option<PublicKey>,
    /// Set for delegates only.
    pub username: Option<String>,
    pub balance: BigInt,
    /// Sum of `stake_weight` over this delegate's voters.
    pub vote_balance: BigInt,
    /// This wallet's contribution to its delegate's `vote_balance`.
    pub stake_weight: BigInt,
    pub stakes: BTreeMap<i64, StakeObject>,
    /// Redeemed stakes, kept so a redeem can be reverted exactly.
    pub redeemed_stakes: BTreeMap<i64, StakeObject>,
    /// Public key of the delegate this wallet votes for.
    pub vote: Option<PublicKey>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Wallet {
    /// A fresh zero-balance wallet.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            public_key: None,
            username: None,
            balance: BigInt::zero(),
            vote_balance: BigInt::zero(),
            stake_weight: BigInt::zero(),
            stakes: BTreeMap::new(),
            redeemed_stakes: BTreeMap::new(),
            vote: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_public_key(public_key: PublicKey) -> Self {
        let mut wallet = Self::new(Address::from_public_key(&public_key));
        wallet.public_key = Some(public_key);
        wallet
    }

    pub fn is_delegate(&self) -> bool {
        self.username.is_some()
    }

    /// Whether `key` was ever used by a stake on this wallet.
    pub fn has_stake_key(&self, key: i64) -> bool {
        self.stakes.contains_key(&key) || self.redeemed_stakes.contains_key(&key)
    }

    /// Read an amount attribute; absent means zero.
    pub fn attribute_amount(&self, name: &str) -> BigInt {
        match self.attributes.get(name) {
            Some(Attribute::Amount(v)) => v.clone(),
            _ => BigInt::zero(),
        }
    }

    /// Write an amount attribute. Zero removes the entry, so an attribute
    /// that is set and then cleared leaves no trace.
    pub fn set_attribute_amount(&mut self, name: &str, value: BigInt) {
        if value.is_zero() {
            self.attributes.remove(name);
        } else {
            self.attributes
                .insert(name.to_string(), Attribute::Amount(value));
        }
    }

    /// Whether the wallet holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero()
            && self.vote_balance.is_zero()
            && self.stake_weight.is_zero()
            && self.username.is_none()
            && self.vote.is_none()
            && self.stakes.is_empty()
            && self.redeemed_stakes.is_empty()
            && self.attributes.is_empty()
    }

    /// Whether any tracked quantity is negative.
    pub fn has_negative_balance(&self) -> bool {
        self.balance.is_negative() || self.stake_weight.is_negative() || self.vote_balance.is_negative()
    }
}
