//! `system_controller`: the at-most-one controller binding per table
//! (spec §3.2). FK violations (no such `registry` row) surface as a
//! `rusqlite::Error` for the caller to classify per §4.3.3.

use rusqlite::{params, Connection, OptionalExtension};

use tablesql_core::{Address, ChainId, TableId};

use crate::error::StorageError;

pub fn set(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    controller: &Address,
    now: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO system_controller (chain_id, table_id, controller, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(chain_id, table_id) DO UPDATE SET
             controller = excluded.controller,
             updated_at = excluded.updated_at",
        params![chain_id.0 as i64, table_id.as_str(), controller.to_lowercase_hex(), now],
    )?;
    Ok(())
}

pub fn unset(conn: &Connection, chain_id: ChainId, table_id: &TableId) -> Result<(), StorageError> {
    conn.execute(
        "DELETE FROM system_controller WHERE chain_id = ?1 AND table_id = ?2",
        params![chain_id.0 as i64, table_id.as_str()],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, chain_id: ChainId, table_id: &TableId) -> Result<Option<Address>, StorageError> {
    let hex: Option<String> = conn
        .query_row(
            "SELECT controller FROM system_controller WHERE chain_id = ?1 AND table_id = ?2",
            params![chain_id.0 as i64, table_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hex.and_then(|h| Address::from_hex(&h).ok()))
}
