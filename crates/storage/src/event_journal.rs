//! `system_evm_events`: append-only journal of every event a `TxnScope`
//! dispatches, keyed by `(chain_id, tx_hash, event_index)` (spec §3.2).
//! The raw `address`/`topics`/`data`/`block_hash`/`tx_index` fields belong
//! to the (out-of-scope) chain-log decoder; this engine only has the
//! already-decoded `Event`, so those columns are left `NULL` here.

use rusqlite::params;
use rusqlite::Connection;

use tablesql_core::{ChainId, Event, TxnHash};

use crate::error::StorageError;

pub fn append(
    conn: &Connection,
    chain_id: ChainId,
    tx_hash: &TxnHash,
    event_index: i64,
    event: &Event,
    block_number: i64,
) -> Result<(), StorageError> {
    let event_json = serde_json::to_string(event).map_err(|e| StorageError::Other(e.to_string()))?;
    conn.execute(
        "INSERT INTO system_evm_events
             (chain_id, tx_hash, event_index, event_type, event_json, block_number)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![chain_id.0 as i64, tx_hash.as_str(), event_index, event.kind(), event_json, block_number],
    )?;
    Ok(())
}
