//! Multi-index wallet store.
//!
//! The registry owns every wallet exclusively, keyed by address. Secondary
//! indexes hold addresses, never wallets, so a wallet has exactly one home
//! and [`Clone`] yields a fully independent registry. The confirmed chain
//! state and each transaction-pool view are separate registries; cloning is
//! the only way to derive one from another.

use num_bigint::BigInt;
use num_traits::Zero;
use std::collections::{BTreeMap, HashMap};

use crate::crypto::{Blake3Hash, PublicKey};
use crate::error::CoreError;
use crate::types::Address;
use crate::wallet::Wallet;

/// In-memory wallet store with address, public-key and username indexes.
#[derive(Clone, Debug, Default)]
pub struct WalletRegistry {
    wallets: BTreeMap<Address, Wallet>,
    by_public_key: HashMap<PublicKey, Address>,
    by_username: HashMap<String, Address>,
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────

    /// Get the wallet for `address`, creating a zero-balance one if absent.
    pub fn find_by_address(&mut self, address: &Address) -> &mut Wallet {
        self.wallets
            .entry(*address)
            .or_insert_with(|| Wallet::new(*address))
    }

    /// Get the wallet owning `public_key`, creating and indexing it if this
    /// key has not been seen before.
    pub fn find_by_public_key(&mut self, public_key: &PublicKey) -> &mut Wallet {
        let address = match self.by_public_key.get(public_key).copied() {
            Some(address) => address,
            None => {
                let address = Address::from_public_key(public_key);
                let wallet = self.find_by_address(&address);
                if wallet.public_key.is_none() {
                    wallet.public_key = Some(*public_key);
                }
                self.by_public_key.insert(*public_key, address);
                address
            }
        };
        self.find_by_address(&address)
    }

    pub fn find_by_username(&mut self, username: &str) -> Option<&mut Wallet> {
        let address = *self.by_username.get(username)?;
        self.wallets.get_mut(&address)
    }

    /// Non-creating lookup by address.
    pub fn get(&self, address: &Address) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Wallet> {
        self.wallets.get_mut(address)
    }

    pub fn get_by_public_key(&self, public_key: &PublicKey) -> Option<&Wallet> {
        self.by_public_key
            .get(public_key)
            .and_then(|address| self.wallets.get(address))
    }

    pub fn get_by_public_key_mut(&mut self, public_key: &PublicKey) -> Option<&mut Wallet> {
        let address = *self.by_public_key.get(public_key)?;
        self.wallets.get_mut(&address)
    }

    pub fn get_by_username(&self, username: &str) -> Option<&Wallet> {
        self.by_username
            .get(username)
            .and_then(|address| self.wallets.get(address))
    }

    pub fn has_by_address(&self, address: &Address) -> bool {
        self.wallets.contains_key(address)
    }

    pub fn has_by_public_key(&self, public_key: &PublicKey) -> bool {
        self.by_public_key.contains_key(public_key)
    }

    pub fn has_by_username(&self, username: &str) -> bool {
        self.by_username.contains_key(username)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Indexing
    // ─────────────────────────────────────────────────────────────────────

    /// Store `wallet` under its address and index its public key and
    /// username. Replaces any wallet previously held for that address.
    ///
    /// Index entries for keys or usernames the wallet no longer has are not
    /// removed; use [`WalletRegistry::forget_by_username`].
    pub fn reindex(&mut self, wallet: Wallet) {
        let address = wallet.address;
        self.wallets.insert(address, wallet);
        self.index(&address);
    }

    /// Refresh the indexes for a wallet mutated in place.
    pub fn index(&mut self, address: &Address) {
        let Some(wallet) = self.wallets.get(address) else {
            return;
        };
        if let Some(public_key) = wallet.public_key {
            self.by_public_key.insert(public_key, *address);
        }
        if let Some(username) = &wallet.username {
            self.by_username.insert(username.clone(), *address);
        }
    }

    pub fn forget_by_username(&mut self, username: &str) {
        self.by_username.remove(username);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Aggregates
    // ─────────────────────────────────────────────────────────────────────

    /// Add `delta` to the vote balance of the delegate `delegate`.
    ///
    /// Returns false if no wallet is indexed under that key.
    pub fn adjust_vote_balance(&mut self, delegate: &PublicKey, delta: &BigInt) -> bool {
        match self.get_by_public_key_mut(delegate) {
            Some(wallet) => {
                wallet.vote_balance += delta;
                true
            }
            None => false,
        }
    }

    /// Recompute every delegate's vote balance from its voters.
    pub fn rebuild_vote_balances(&mut self) {
        let mut totals: HashMap<PublicKey, BigInt> = HashMap::new();
        for wallet in self.wallets.values() {
            if let Some(delegate) = wallet.vote {
                *totals.entry(delegate).or_insert_with(BigInt::zero) += &wallet.stake_weight;
            }
        }

        let delegates: Vec<Address> = self.by_username.values().copied().collect();
        for address in delegates {
            if let Some(wallet) = self.wallets.get_mut(&address) {
                wallet.vote_balance = wallet
                    .public_key
                    .and_then(|pk| totals.get(&pk).cloned())
                    .unwrap_or_else(BigInt::zero);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    /// Delegate wallets, in address order.
    pub fn delegates(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values().filter(|w| w.is_delegate())
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Addresses of wallets holding a negative quantity.
    pub fn negative_wallets(&self) -> Vec<Address> {
        self.wallets
            .values()
            .filter(|w| w.has_negative_balance())
            .map(|w| w.address)
            .collect()
    }

    /// Digest of all wallets in address order.
    ///
    /// Two registries with equal digests hold identical wallet state. Empty
    /// wallets carry no state and are left out.
    pub fn state_hash(&self) -> Result<Blake3Hash, CoreError> {
        let wallets: Vec<&Wallet> = self.wallets.values().filter(|w| !w.is_empty()).collect();
        let mut buf = Vec::new();
        ciborium::into_writer(&wallets, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(Blake3Hash::hash(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn pk(seed: u8) -> PublicKey {
        Keypair::from_seed(&[seed; 32]).public_key()
    }

    #[test]
    fn test_find_by_address_creates_lazily() {
        let mut registry = WalletRegistry::new();
        let addr = Address::from_bytes([3; 20]);

        assert!(!registry.has_by_address(&addr));
        assert_eq!(registry.find_by_address(&addr).balance, BigInt::zero());
        assert!(registry.has_by_address(&addr));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_public_key_lookup_shares_wallet_with_address() {
        let mut registry = WalletRegistry::new();
        let key = pk(1);
        let addr = Address::from_public_key(&key);

        registry.find_by_address(&addr).balance = BigInt::from(50);
        let wallet = registry.find_by_public_key(&key);
        assert_eq!(wallet.balance, BigInt::from(50));
        assert_eq!(wallet.public_key, Some(key));
        assert!(registry.has_by_public_key(&key));
    }

    #[test]
    fn test_has_checks_do_not_create() {
        let registry = WalletRegistry::new();
        assert!(!registry.has_by_public_key(&pk(2)));
        assert!(!registry.has_by_username("genesis_1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reindex_username_and_stale_entries() {
        let mut registry = WalletRegistry::new();
        let mut wallet = Wallet::with_public_key(pk(4));
        wallet.username = Some("alice".into());
        registry.reindex(wallet);

        assert!(registry.has_by_username("alice"));
        assert_eq!(
            registry.get_by_username("alice").map(|w| w.public_key),
            Some(Some(pk(4)))
        );

        // Renaming in place leaves the old entry until it is forgotten.
        let addr = Address::from_public_key(&pk(4));
        registry.find_by_address(&addr).username = Some("bob".into());
        registry.index(&addr);
        assert!(registry.has_by_username("alice"));
        assert!(registry.has_by_username("bob"));

        registry.forget_by_username("alice");
        assert!(!registry.has_by_username("alice"));
        assert!(registry.find_by_username("bob").is_some());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = WalletRegistry::new();
        original.find_by_public_key(&pk(5)).balance = BigInt::from(10);

        let mut copy = original.clone();
        copy.find_by_public_key(&pk(5)).balance = BigInt::from(99);
        copy.find_by_public_key(&pk(6));

        assert_eq!(original.get_by_public_key(&pk(5)).unwrap().balance, BigInt::from(10));
        assert!(!original.has_by_public_key(&pk(6)));

        original.find_by_public_key(&pk(5)).balance = BigInt::from(1);
        assert_eq!(copy.get_by_public_key(&pk(5)).unwrap().balance, BigInt::from(99));
    }

    #[test]
    fn test_rebuild_vote_balances() {
        let mut registry = WalletRegistry::new();
        let delegate = pk(7);
        let mut d = Wallet::with_public_key(delegate);
        d.username = Some("dele".into());
        d.vote_balance = BigInt::from(12345);
        registry.reindex(d);

        for seed in [8u8, 9] {
            let voter = registry.find_by_public_key(&pk(seed));
            voter.vote = Some(delegate);
            voter.stake_weight = BigInt::from(seed as i64 * 10);
        }
        registry.rebuild_vote_balances();

        assert_eq!(
            registry.get_by_public_key(&delegate).unwrap().vote_balance,
            BigInt::from(170)
        );
    }

    #[test]
    fn test_state_hash_tracks_content() {
        let mut a = WalletRegistry::new();
        a.find_by_public_key(&pk(1)).balance = BigInt::from(5);
        let b = a.clone();
        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());

        a.find_by_public_key(&pk(1)).balance = BigInt::from(6);
        assert_ne!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }

    #[test]
    fn test_state_hash_ignores_empty_wallets() {
        let mut a = WalletRegistry::new();
        a.find_by_public_key(&pk(1)).balance = BigInt::from(5);
        let mut b = a.clone();
        b.find_by_public_key(&pk(2));
        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }
}
