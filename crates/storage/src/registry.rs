//! The `registry` system table: one row per live table (spec §3.2).
//! Tables are never dropped, never altered, so this store only ever
//! inserts and updates `controller`.

use rusqlite::{params, Connection, OptionalExtension};

use tablesql_core::{Address, ChainId, TableId, TablePrefix};

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct TableRow {
    pub chain_id: i64,
    pub id: String,
    pub controller: String,
    pub prefix: String,
    pub structure: String,
    pub created_at: i64,
}

pub fn insert(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    controller: &Address,
    prefix: &TablePrefix,
    structure: &str,
    created_at: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO registry (chain_id, id, controller, prefix, structure, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chain_id.0 as i64,
            table_id.as_str(),
            controller.to_lowercase_hex(),
            prefix.as_str(),
            structure,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn lookup(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
) -> Result<Option<TableRow>, StorageError> {
    conn.query_row(
        "SELECT chain_id, id, controller, prefix, structure, created_at
         FROM registry WHERE chain_id = ?1 AND id = ?2",
        params![chain_id.0 as i64, table_id.as_str()],
        |row| {
            Ok(TableRow {
                chain_id: row.get(0)?,
                id: row.get(1)?,
                controller: row.get(2)?,
                prefix: row.get(3)?,
                structure: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(StorageError::from)
}

/// Step 1 of `TransferTable` (spec §4.3.4).
pub fn set_controller(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    new_controller: &Address,
) -> Result<(), StorageError> {
    conn.execute(
        "UPDATE registry SET controller = ?1 WHERE chain_id = ?2 AND id = ?3",
        params![new_controller.to_lowercase_hex(), chain_id.0 as i64, table_id.as_str()],
    )?;
    Ok(())
}

/// Current row count of the physical user table, used by the row-count
/// limit (spec I6) and the `TABLE_LOOKUP` guard (spec §4.3.2).
pub fn physical_row_count(conn: &Connection, physical_table_name: &str) -> Result<i64, StorageError> {
    // The physical name is constructed by this engine from validated
    // identifiers (prefix/chain id/table id), never from unsanitized user
    // input, so interpolating it into the query text is safe here.
    let sql = format!("SELECT COUNT(1) FROM \"{}\"", physical_table_name);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

pub fn by_controller(
    conn: &Connection,
    chain_id: ChainId,
    controller: &Address,
) -> Result<Vec<TableRow>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT chain_id, id, controller, prefix, structure, created_at
         FROM registry WHERE chain_id = ?1 AND controller = ?2",
    )?;
    let rows = stmt
        .query_map(params![chain_id.0 as i64, controller.to_lowercase_hex()], |row| {
            Ok(TableRow {
                chain_id: row.get(0)?,
                id: row.get(1)?,
                controller: row.get(2)?,
                prefix: row.get(3)?,
                structure: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn by_structure(conn: &Connection, chain_id: ChainId, structure: &str) -> Result<Vec<TableRow>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT chain_id, id, controller, prefix, structure, created_at
         FROM registry WHERE chain_id = ?1 AND structure = ?2",
    )?;
    let rows = stmt
        .query_map(params![chain_id.0 as i64, structure], |row| {
            Ok(TableRow {
                chain_id: row.get(0)?,
                id: row.get(1)?,
                controller: row.get(2)?,
                prefix: row.get(3)?,
                structure: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
