//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: deterministic keys and a block
//! builder that keeps heights, timestamps and parent links consistent.

use stakeledger_core::{
    Address, BigInt, Blake3Hash, Block, BlockHeader, Keypair, PublicKey, Transaction,
    TransactionBuilder, WalletRegistry, GENESIS_HEIGHT,
};

/// Base units per coin on the development network.
pub const COIN: u64 = 100_000_000;

/// Network time of the genesis block.
pub const GENESIS_TIMESTAMP: i64 = 1_000;

/// Seconds between fixture blocks.
pub const BLOCK_TIME: i64 = 8;

/// Seed of the key that signs genesis allocations.
const GENESIS_SEED: u8 = 0xff;

/// Deterministic parties plus a chain of blocks built on top of each other.
pub struct ChainFixture {
    pub genesis_key: Keypair,
    pub parties: Vec<Keypair>,
    next_height: u64,
    previous: Option<Blake3Hash>,
    timestamp: i64,
}

impl ChainFixture {
    /// `parties` keypairs seeded 1, 2, 3...
    pub fn new(parties: usize) -> Self {
        Self {
            genesis_key: Keypair::from_seed(&[GENESIS_SEED; 32]),
            parties: multi_party_keypairs(parties),
            next_height: GENESIS_HEIGHT,
            previous: None,
            timestamp: GENESIS_TIMESTAMP - BLOCK_TIME,
        }
    }

    pub fn keypair(&self, party: usize) -> &Keypair {
        &self.parties[party]
    }

    pub fn public_key(&self, party: usize) -> PublicKey {
        self.parties[party].public_key()
    }

    pub fn address(&self, party: usize) -> Address {
        Address::from_public_key(&self.public_key(party))
    }

    /// Network time of the last block built.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn next_height(&self) -> u64 {
        self.next_height
    }

    /// The genesis block, granting `coins` to every party.
    pub fn genesis(&mut self, coins: u64) -> Block {
        let allocations = (0..self.parties.len())
            .map(|party| {
                TransactionBuilder::transfer(self.address(party), coins * COIN)
                    .timestamp(party as i64)
                    .sign(&self.genesis_key)
            })
            .collect();
        self.block(allocations)
    }

    /// The next block, one block time after the last.
    pub fn block(&mut self, transactions: Vec<Transaction>) -> Block {
        let timestamp = self.timestamp + BLOCK_TIME;
        self.block_at(timestamp, transactions)
    }

    /// The next block at an explicit network time.
    pub fn block_at(&mut self, timestamp: i64, transactions: Vec<Transaction>) -> Block {
        let block = Block::new(self.next_height, timestamp, self.previous, transactions);
        self.follow(&block.header);
        block
    }

    /// Empty blocks up to and including `height`.
    pub fn empty_blocks_until(&mut self, height: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        while self.next_height <= height {
            blocks.push(self.block(Vec::new()));
        }
        blocks
    }

    /// Continue building on top of `header`, e.g. after a rejected block
    /// or a revert.
    pub fn follow(&mut self, header: &BlockHeader) {
        self.next_height = header.height + 1;
        self.previous = Some(header.id);
        self.timestamp = header.timestamp;
    }

    /// Continue from before genesis.
    pub fn restart(&mut self) {
        self.next_height = GENESIS_HEIGHT;
        self.previous = None;
        self.timestamp = GENESIS_TIMESTAMP - BLOCK_TIME;
    }
}

/// Keypairs seeded 1..=count.
pub fn multi_party_keypairs(count: usize) -> Vec<Keypair> {
    (1..=count)
        .map(|i| Keypair::from_seed(&[i as u8; 32]))
        .collect()
}

/// A registry holding `coins` for each of `keypairs`.
pub fn funded_registry(keypairs: &[Keypair], coins: u64) -> WalletRegistry {
    let mut registry = WalletRegistry::new();
    for keypair in keypairs {
        registry.find_by_public_key(&keypair.public_key()).balance =
            BigInt::from(coins) * BigInt::from(COIN);
    }
    registry
}
