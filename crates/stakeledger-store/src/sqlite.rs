//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use stakeledger_core::{
    Address, Blake3Hash, Block, BlockHeader, ExpirationRecord, Transaction, TransactionKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{BlockWriter, ChainTip, ExpirationStore, TransactionHistory, TransactionRecord};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await?
    }
}

fn blob_error(idx: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(idx, name.into(), rusqlite::types::Type::Blob)
}

fn row_to_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockHeader> {
    let id: Vec<u8> = row.get(0)?;
    let previous: Option<Vec<u8>> = row.get(3)?;
    let previous_block = match previous {
        Some(bytes) => Some(Blake3Hash(
            bytes.try_into().map_err(|_| blob_error(3, "previous_block"))?,
        )),
        None => None,
    };

    Ok(BlockHeader {
        id: Blake3Hash(id.try_into().map_err(|_| blob_error(0, "id"))?),
        height: row.get::<_, i64>(1)? as u64,
        timestamp: row.get(2)?,
        previous_block,
    })
}

fn row_to_expiration(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExpirationRecord> {
    let address: Vec<u8> = row.get(0)?;
    Ok(ExpirationRecord {
        address: Address(address.try_into().map_err(|_| blob_error(0, "address"))?),
        stake_key: row.get(1)?,
        redeemable_timestamp: row.get(2)?,
    })
}

fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(tx, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_transaction(bytes: &[u8]) -> Result<Transaction> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn tip_height(conn: &Connection) -> Result<Option<u64>> {
    let height: Option<i64> = conn.query_row("SELECT MAX(height) FROM blocks", [], |row| row.get(0))?;
    Ok(height.map(|h| h as u64))
}

#[async_trait]
impl TransactionHistory for SqliteStore {
    async fn find_all_by_type(&self, key: TransactionKey) -> Result<Vec<TransactionRecord>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT t.block_height, b.timestamp, t.sequence, t.data
                 FROM transactions t JOIN blocks b ON b.height = t.block_height
                 WHERE t.type_group = ?1 AND t.type = ?2
                 ORDER BY t.block_height, t.sequence",
            )?;
            let rows = stmt
                .query_map(params![key.group, key.kind], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(height, timestamp, sequence, data)| {
                    Ok(TransactionRecord {
                        block_height: height as u64,
                        block_timestamp: timestamp,
                        sequence,
                        transaction: decode_transaction(&data)?,
                    })
                })
                .collect()
        })
        .await
    }
}

#[async_trait]
impl ExpirationStore for SqliteStore {
    async fn find_one(
        &self,
        address: &Address,
        stake_key: i64,
        redeemable_timestamp: i64,
    ) -> Result<Option<ExpirationRecord>> {
        let address = *address;
        self.run(move |conn| {
            let record = conn
                .query_row(
                    "SELECT address, stake_key, redeemable_timestamp FROM expirations
                     WHERE address = ?1 AND stake_key = ?2 AND redeemable_timestamp = ?3",
                    params![address.0.to_vec(), stake_key, redeemable_timestamp],
                    row_to_expiration,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn find_and_count(&self, before: i64) -> Result<(Vec<ExpirationRecord>, usize)> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT address, stake_key, redeemable_timestamp FROM expirations
                 WHERE redeemable_timestamp < ?1
                 ORDER BY redeemable_timestamp, address, stake_key",
            )?;
            let records = stmt
                .query_map(params![before], row_to_expiration)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let count = records.len();
            Ok((records, count))
        })
        .await
    }

    async fn save(&self, record: &ExpirationRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO expirations (address, stake_key, redeemable_timestamp)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.address.0.to_vec(),
                    record.stake_key,
                    record.redeemable_timestamp
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, record: &ExpirationRecord) -> Result<bool> {
        let record = record.clone();
        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM expirations
                 WHERE address = ?1 AND stake_key = ?2 AND redeemable_timestamp = ?3",
                params![
                    record.address.0.to_vec(),
                    record.stake_key,
                    record.redeemable_timestamp
                ],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl ChainTip for SqliteStore {
    async fn last_block(&self) -> Result<Option<BlockHeader>> {
        self.run(|conn| {
            let header = conn
                .query_row(
                    "SELECT id, height, timestamp, previous_block FROM blocks
                     ORDER BY height DESC LIMIT 1",
                    [],
                    row_to_header,
                )
                .optional()?;
            Ok(header)
        })
        .await
    }

    async fn header_at(&self, height: u64) -> Result<Option<BlockHeader>> {
        self.run(move |conn| {
            let header = conn
                .query_row(
                    "SELECT id, height, timestamp, previous_block FROM blocks WHERE height = ?1",
                    params![height as i64],
                    row_to_header,
                )
                .optional()?;
            Ok(header)
        })
        .await
    }
}

#[async_trait]
impl BlockWriter for SqliteStore {
    async fn save_block(&self, block: &Block) -> Result<()> {
        let block = block.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let tip = tip_height(&tx)?;
            let expected = tip.map_or(block.height(), |h| h + 1);
            if block.height() != expected {
                return Err(StoreError::NotTip {
                    height: block.height(),
                    tip,
                });
            }

            tx.execute(
                "INSERT INTO blocks (id, height, timestamp, previous_block) VALUES (?1, ?2, ?3, ?4)",
                params![
                    block.header.id.0.to_vec(),
                    block.height() as i64,
                    block.timestamp(),
                    block.header.previous_block.map(|h| h.0.to_vec()),
                ],
            )?;

            for (sequence, transaction) in block.transactions.iter().enumerate() {
                tx.execute(
                    "INSERT INTO transactions
                     (id, block_height, sequence, type, type_group, sender_public_key, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        transaction.id.0.to_vec(),
                        block.height() as i64,
                        sequence as u32,
                        transaction.data.key.kind,
                        transaction.data.key.group,
                        transaction.sender().0.to_vec(),
                        encode_transaction(transaction)?,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_block(&self, header: &BlockHeader) -> Result<()> {
        let height = header.height;
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let tip = tip_height(&tx)?;
            if tip != Some(height) {
                return Err(StoreError::NotTip { height, tip });
            }

            tx.execute(
                "DELETE FROM transactions WHERE block_height = ?1",
                params![height as i64],
            )?;
            tx.execute("DELETE FROM blocks WHERE height = ?1", params![height as i64])?;

            tx.commit()?;
            Ok(())
        })
        .await
    }
}
