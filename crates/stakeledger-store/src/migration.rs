//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_secs()],
            )?;
        }

        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "migrated ledger schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Confirmed blocks, one per height
        CREATE TABLE blocks (
            id BLOB PRIMARY KEY,              -- 32 bytes, Blake3 block id
            height INTEGER NOT NULL UNIQUE,
            timestamp INTEGER NOT NULL,       -- network time, seconds
            previous_block BLOB               -- 32 bytes, NULL for genesis
        );

        -- Confirmed transactions in chain order
        CREATE TABLE transactions (
            id BLOB PRIMARY KEY,              -- 32 bytes, transaction id
            block_height INTEGER NOT NULL REFERENCES blocks(height) ON DELETE CASCADE,
            sequence INTEGER NOT NULL,        -- index within the block
            type INTEGER NOT NULL,
            type_group INTEGER NOT NULL,
            sender_public_key BLOB NOT NULL,  -- 32 bytes
            data BLOB NOT NULL,               -- CBOR-encoded transaction

            UNIQUE(block_height, sequence)
        );

        -- Stakes awaiting their halving
        CREATE TABLE expirations (
            address BLOB NOT NULL,            -- 20 bytes
            stake_key INTEGER NOT NULL,       -- stake creation timestamp
            redeemable_timestamp INTEGER NOT NULL,
            PRIMARY KEY (address, stake_key, redeemable_timestamp)
        );

        CREATE INDEX idx_transactions_type ON transactions(type_group, type, block_height, sequence);
        CREATE INDEX idx_expirations_due ON expirations(redeemable_timestamp);
        "#,
    )?;

    Ok(())
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
