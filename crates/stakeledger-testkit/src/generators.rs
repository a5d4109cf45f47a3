//! Proptest generators for property-based testing.

use proptest::prelude::*;

use stakeledger_core::{
    Address, Blake3Hash, HtlcExpiration, Keypair, PublicKey, Transaction, TransactionBuilder,
    WalletRegistry,
};

use crate::fixtures::COIN;

/// Stake durations configured on the development network.
pub const DEVNET_DURATIONS: [i64; 4] = [7_889_400, 15_778_800, 31_557_600, 63_115_200];

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from_bytes)
}

/// Generate a stake duration with a configured multiplier.
pub fn stake_duration() -> impl Strategy<Value = i64> {
    prop::sample::select(DEVNET_DURATIONS.to_vec())
}

/// Generate a valid delegate username.
pub fn username() -> impl Strategy<Value = String> {
    "[a-z0-9!@$&_.]{1,20}".prop_map(String::from)
}

/// One step a party may take against the ledger.
#[derive(Debug, Clone)]
pub enum LedgerOp {
    Transfer { from: usize, to: usize, coins: u64 },
    Register { who: usize, name: String },
    Vote { from: usize, delegate: usize },
    Unvote { from: usize },
    Lock { from: usize, to: usize, coins: u64 },
    Stake { from: usize, coins: u64, duration: i64 },
    Redeem { from: usize },
}

/// Generate an operation among `parties` parties.
pub fn ledger_op(parties: usize) -> impl Strategy<Value = LedgerOp> {
    let party = 0..parties;
    prop_oneof![
        (party.clone(), party.clone(), 1u64..50)
            .prop_map(|(from, to, coins)| LedgerOp::Transfer { from, to, coins }),
        (party.clone(), username()).prop_map(|(who, name)| LedgerOp::Register { who, name }),
        (party.clone(), party.clone()).prop_map(|(from, delegate)| LedgerOp::Vote { from, delegate }),
        party.clone().prop_map(|from| LedgerOp::Unvote { from }),
        (party.clone(), party.clone(), 1u64..50)
            .prop_map(|(from, to, coins)| LedgerOp::Lock { from, to, coins }),
        (party.clone(), 1u64..100, stake_duration())
            .prop_map(|(from, coins, duration)| LedgerOp::Stake { from, coins, duration }),
        party.prop_map(|from| LedgerOp::Redeem { from }),
    ]
}

/// Turn `op` into a signed transaction against the current `registry`.
///
/// `now` is the reference time and `seq` makes otherwise identical
/// transactions distinct. Returns `None` when the op has nothing to act on
/// (an unvote without a vote, a redeem without a stake).
pub fn op_transaction(
    op: &LedgerOp,
    parties: &[Keypair],
    registry: &WalletRegistry,
    now: i64,
    seq: i64,
) -> Option<Transaction> {
    let address = |party: usize| Address::from_public_key(&parties[party].public_key());
    let wallet = |party: usize| registry.get_by_public_key(&parties[party].public_key());

    let (signer, builder) = match op {
        LedgerOp::Transfer { from, to, coins } => (
            *from,
            TransactionBuilder::transfer(address(*to), coins * COIN).fee(1),
        ),
        LedgerOp::Register { who, name } => {
            (*who, TransactionBuilder::delegate_registration(name.clone()))
        }
        LedgerOp::Vote { from, delegate } => (
            *from,
            TransactionBuilder::vote(parties[*delegate].public_key()),
        ),
        LedgerOp::Unvote { from } => (*from, TransactionBuilder::unvote(wallet(*from)?.vote?)),
        LedgerOp::Lock { from, to, coins } => (
            *from,
            TransactionBuilder::htlc_lock(
                address(*to),
                coins * COIN,
                Blake3Hash::hash(&seq.to_be_bytes()),
                HtlcExpiration::Timestamp(now + 3_600),
            ),
        ),
        LedgerOp::Stake { from, coins, duration } => (
            *from,
            TransactionBuilder::stake_create(*duration, coins * COIN, now + seq % 100),
        ),
        LedgerOp::Redeem { from } => {
            let stake = wallet(*from)?.stakes.values().next()?;
            (
                *from,
                TransactionBuilder::stake_redeem(stake.key()).timestamp(stake.redeemable_timestamp),
            )
        }
    };

    let builder = match op {
        LedgerOp::Stake { .. } | LedgerOp::Redeem { .. } => builder,
        _ => builder.timestamp(now + seq),
    };
    Some(builder.sign(&parties[signer]))
}
