//! `system_txn_receipts`: the per-transaction durable processing record
//! (spec §3.2, §3.4). Never mutated once inserted.

use rusqlite::{params, Connection, OptionalExtension};

use tablesql_core::{ChainId, TxnHash};

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct Receipt {
    pub chain_id: i64,
    pub txn_hash: String,
    pub block_number: i64,
    pub index_in_block: i64,
    pub table_id: Option<String>,
    pub error: Option<String>,
    pub error_event_idx: Option<i64>,
}

/// Idempotency gate (spec §4.2, §5): callers check this before
/// re-executing a transaction's events after a crash-recovery restart.
pub fn exists(conn: &Connection, chain_id: ChainId, txn_hash: &TxnHash) -> Result<bool, StorageError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM system_txn_receipts WHERE chain_id = ?1 AND txn_hash = ?2",
            params![chain_id.0 as i64, txn_hash.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Error strings are passed through a valid-UTF-8 filter before storage.
fn sanitize_error(msg: &str) -> String {
    String::from_utf8_lossy(msg.as_bytes()).into_owned()
}

pub fn insert(conn: &Connection, receipt: &Receipt) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO system_txn_receipts
             (chain_id, txn_hash, block_number, index_in_block, table_id, error, error_event_idx)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            receipt.chain_id,
            receipt.txn_hash,
            receipt.block_number,
            receipt.index_in_block,
            receipt.table_id,
            receipt.error.as_deref().map(sanitize_error),
            receipt.error_event_idx,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, chain_id: ChainId, txn_hash: &TxnHash) -> Result<Option<Receipt>, StorageError> {
    conn.query_row(
        "SELECT chain_id, txn_hash, block_number, index_in_block, table_id, error, error_event_idx
         FROM system_txn_receipts WHERE chain_id = ?1 AND txn_hash = ?2",
        params![chain_id.0 as i64, txn_hash.as_str()],
        |row| {
            Ok(Receipt {
                chain_id: row.get(0)?,
                txn_hash: row.get(1)?,
                block_number: row.get(2)?,
                index_in_block: row.get(3)?,
                table_id: row.get(4)?,
                error: row.get(5)?,
                error_event_idx: row.get(6)?,
            })
        },
    )
    .optional()
    .map_err(StorageError::from)
}

/// The block cursor (`system_txn_processor`): single row per chain,
/// monotonic non-decreasing (Invariant I3/I4).
pub fn last_processed_block(conn: &Connection, chain_id: ChainId) -> Result<i64, StorageError> {
    let v: Option<i64> = conn
        .query_row(
            "SELECT block_number FROM system_txn_processor WHERE chain_id = ?1",
            params![chain_id.0 as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(v.unwrap_or(0))
}

pub fn set_last_processed_block(conn: &Connection, chain_id: ChainId, block_number: i64) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO system_txn_processor (chain_id, block_number) VALUES (?1, ?2)
         ON CONFLICT(chain_id) DO UPDATE SET block_number = excluded.block_number",
        params![chain_id.0 as i64, block_number],
    )?;
    Ok(())
}
