//! Blocks as seen by the ledger: a header plus an ordered transaction set.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::crypto::Blake3Hash;
use crate::transaction::Transaction;

/// Height of the genesis block. Transfers in it mint rather than move funds.
pub const GENESIS_HEIGHT: u64 = 1;

/// The parts of a block the ledger needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: Blake3Hash,
    pub height: u64,
    /// Network time in seconds.
    pub timestamp: i64,
    pub previous_block: Option<Blake3Hash>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Assemble a block, putting transactions in canonical order.
    pub fn new(
        height: u64,
        timestamp: i64,
        previous_block: Option<Blake3Hash>,
        mut transactions: Vec<Transaction>,
    ) -> Self {
        sort_transactions(&mut transactions);
        let id = compute_block_id(height, timestamp, previous_block.as_ref(), &transactions);
        Self {
            header: BlockHeader {
                id,
                height,
                timestamp,
                previous_block,
            },
            transactions,
        }
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn is_genesis(&self) -> bool {
        self.header.height == GENESIS_HEIGHT
    }
}

/// Canonical transaction order: fee descending, then id ascending.
pub fn canonical_order(a: &Transaction, b: &Transaction) -> Ordering {
    b.data.fee.cmp(&a.data.fee).then_with(|| a.id.cmp(&b.id))
}

pub fn sort_transactions(transactions: &mut [Transaction]) {
    transactions.sort_by(canonical_order);
}

fn compute_block_id(
    height: u64,
    timestamp: i64,
    previous_block: Option<&Blake3Hash>,
    transactions: &[Transaction],
) -> Blake3Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&height.to_be_bytes());
    hasher.update(&timestamp.to_be_bytes());
    hasher.update(previous_block.map(|h| h.as_bytes()).unwrap_or(&[0u8; 32]));
    for tx in transactions {
        hasher.update(tx.id.as_bytes());
    }
    Blake3Hash(*hasher.finalize().as_bytes())
}
