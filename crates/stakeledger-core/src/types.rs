//! Strong type definitions for stakeledger.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Blake3Hash, PublicKey};

/// Domain separator for address derivation.
const ADDRESS_DOMAIN: &[u8] = b"stakeledger-address-v0:";

/// A 20-byte wallet address, derived from a public key.
///
/// The address is the stable primary key of a wallet. It exists before the
/// wallet's public key is known (a wallet can receive funds first) and never
/// changes afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Derive the address for a public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = Blake3Hash::hash_parts(&[ADDRESS_DOMAIN, public_key.as_bytes()]);
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest.0[..20]);
        Self(arr)
    }

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<&PublicKey> for Address {
    fn from(public_key: &PublicKey) -> Self {
        Self::from_public_key(public_key)
    }
}

/// A 32-byte transaction identifier, computed as
/// Blake3(canonical_data || signature).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub [u8; 32]);

impl TransactionId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The zero id (placeholder before a transaction is signed).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for TransactionId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for TransactionId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Dispatch key for transaction handlers: (type, type-group).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionKey {
    pub kind: u16,
    pub group: u32,
}

impl TransactionKey {
    /// Type group of the built-in transaction types.
    pub const CORE_GROUP: u32 = 1;

    pub const TRANSFER: Self = Self::core(0);
    pub const DELEGATE_REGISTRATION: Self = Self::core(2);
    pub const VOTE: Self = Self::core(3);
    pub const HTLC_LOCK: Self = Self::core(8);
    pub const STAKE_CREATE: Self = Self::core(100);
    pub const STAKE_REDEEM: Self = Self::core(101);

    pub const fn new(kind: u16, group: u32) -> Self {
        Self { kind, group }
    }

    const fn core(kind: u16) -> Self {
        Self {
            kind,
            group: Self::CORE_GROUP,
        }
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_address_derivation_is_stable() {
        let pk = Keypair::from_seed(&[0x42; 32]).public_key();
        assert_eq!(Address::from_public_key(&pk), Address::from(&pk));

        let other = Keypair::from_seed(&[0x43; 32]).public_key();
        assert_ne!(Address::from_public_key(&pk), Address::from_public_key(&other));
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::from_bytes([0xab; 20]);
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
        assert!(Address::from_hex(&"ab".repeat(32)).is_err());
    }

    #[test]
    fn test_transaction_id_hex_roundtrip() {
        let id = TransactionId::from_bytes([0xcd; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(TransactionId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn test_transaction_key_display() {
        assert_eq!(TransactionKey::STAKE_CREATE.to_string(), "1/100");
        assert_ne!(TransactionKey::STAKE_CREATE, TransactionKey::new(100, 2));
    }
}
