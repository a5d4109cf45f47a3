//! Canonical CBOR encoding for transaction identity.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (amounts are big-endian two's complement byte strings)
//!
//! Signatures and ids are computed over these bytes, so the same
//! transaction must encode identically on every platform.

use ciborium::value::Value;
use num_bigint::BigInt;

use crate::transaction::{Asset, HtlcExpiration, TransactionData, VoteAsset};

/// Data field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const KIND: u64 = 1;
    pub const GROUP: u64 = 2;
    pub const TIMESTAMP: u64 = 3;
    pub const SENDER: u64 = 4;
    pub const FEE: u64 = 5;
    pub const AMOUNT: u64 = 6;
    pub const RECIPIENT: u64 = 7;
    pub const ASSET: u64 = 8;
}

/// Asset variant tags.
mod asset_tags {
    pub const NONE: u64 = 0;
    pub const DELEGATE_REGISTRATION: u64 = 1;
    pub const VOTE: u64 = 2;
    pub const UNVOTE: u64 = 3;
    pub const HTLC_LOCK: u64 = 4;
    pub const STAKE_CREATE: u64 = 5;
    pub const STAKE_REDEEM: u64 = 6;
}

/// Encode transaction data to canonical CBOR bytes.
pub fn canonical_data_bytes(data: &TransactionData) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &data_to_cbor_value(data));
    buf
}

fn int(n: u64) -> Value {
    Value::Integer(n.into())
}

fn amount(n: &BigInt) -> Value {
    Value::Bytes(n.to_signed_bytes_be())
}

fn data_to_cbor_value(data: &TransactionData) -> Value {
    let recipient = match &data.recipient {
        Some(addr) => Value::Bytes(addr.0.to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (int(keys::VERSION), Value::Integer(data.version.into())),
        (int(keys::KIND), Value::Integer(data.key.kind.into())),
        (int(keys::GROUP), Value::Integer(data.key.group.into())),
        (int(keys::TIMESTAMP), Value::Integer(data.timestamp.into())),
        (int(keys::SENDER), Value::Bytes(data.sender_public_key.0.to_vec())),
        (int(keys::FEE), amount(&data.fee)),
        (int(keys::AMOUNT), amount(&data.amount)),
        (int(keys::RECIPIENT), recipient),
        (int(keys::ASSET), asset_to_cbor_value(&data.asset)),
    ])
}

/// Assets encode as a map whose key 0 is the variant tag.
fn asset_to_cbor_value(asset: &Asset) -> Value {
    let mut entries = Vec::with_capacity(4);
    match asset {
        Asset::None => {
            entries.push((int(0), int(asset_tags::NONE)));
        }
        Asset::DelegateRegistration { username } => {
            entries.push((int(0), int(asset_tags::DELEGATE_REGISTRATION)));
            entries.push((int(1), Value::Text(username.clone())));
        }
        Asset::Vote(vote) => {
            let (tag, delegate) = match vote {
                VoteAsset::Vote(pk) => (asset_tags::VOTE, pk),
                VoteAsset::Unvote(pk) => (asset_tags::UNVOTE, pk),
            };
            entries.push((int(0), int(tag)));
            entries.push((int(1), Value::Bytes(delegate.0.to_vec())));
        }
        Asset::HtlcLock {
            secret_hash,
            expiration,
        } => {
            entries.push((int(0), int(asset_tags::HTLC_LOCK)));
            entries.push((int(1), Value::Bytes(secret_hash.0.to_vec())));
            let (kind, value) = match expiration {
                HtlcExpiration::Timestamp(ts) => (0u64, Value::Integer((*ts).into())),
                HtlcExpiration::BlockHeight(h) => (1u64, Value::Integer((*h).into())),
            };
            entries.push((int(2), int(kind)));
            entries.push((int(3), value));
        }
        Asset::StakeCreate(stake) => {
            entries.push((int(0), int(asset_tags::STAKE_CREATE)));
            entries.push((int(1), Value::Integer(stake.duration.into())));
            entries.push((int(2), amount(&stake.amount)));
            entries.push((int(3), Value::Integer(stake.timestamp.into())));
        }
        Asset::StakeRedeem { stake_key } => {
            entries.push((int(0), int(asset_tags::STAKE_REDEEM)));
            entries.push((int(1), Value::Integer((*stake_key).into())));
        }
    }
    Value::Map(entries)
}

/// Recursively encode a CBOR value.
///
/// Only the value shapes produced above occur; anything else encodes as
/// null so the encoder stays total.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        _ => buf.push(0xf6),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n = i128::from(i);

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
