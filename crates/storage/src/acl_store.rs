//! `system_acl`: upsert-on-conflict ACL entries (spec §3.2/§4.5). Grant
//! OR-merges the bitfield, revoke AND-clears it; a zero bitfield row is a
//! valid "no privileges" row, never deleted.

use rusqlite::{params, Connection, OptionalExtension};

use tablesql_core::{Address, ChainId, Operation, Privileges, TableId};

use crate::error::StorageError;

/// Seeds the owner's ACL row at table creation (spec §3.4, §4.3.1 step 3).
pub fn seed_owner(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    owner: &Address,
    now: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO system_acl (chain_id, table_id, controller, privileges, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            chain_id.0 as i64,
            table_id.as_str(),
            owner.to_lowercase_hex(),
            Privileges::ALL.bits(),
            now,
        ],
    )?;
    Ok(())
}

fn current_bits(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    controller: &Address,
) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT privileges FROM system_acl WHERE chain_id = ?1 AND table_id = ?2 AND controller = ?3",
        params![chain_id.0 as i64, table_id.as_str(), controller.to_lowercase_hex()],
        |row| row.get(0),
    )
    .optional()
    .map(|v| v.unwrap_or(0))
    .map_err(StorageError::from)
}

fn upsert_bits(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    controller: &Address,
    bits: i64,
    now: i64,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO system_acl (chain_id, table_id, controller, privileges, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(chain_id, table_id, controller) DO UPDATE SET
             privileges = excluded.privileges,
             updated_at = excluded.updated_at",
        params![chain_id.0 as i64, table_id.as_str(), controller.to_lowercase_hex(), bits, now],
    )?;
    Ok(())
}

pub fn grant(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    grantee: &Address,
    privileges: Privileges,
    now: i64,
) -> Result<(), StorageError> {
    let before = Privileges::from_bits(current_bits(conn, chain_id, table_id, grantee)?);
    let after = before | privileges;
    upsert_bits(conn, chain_id, table_id, grantee, after.bits(), now)
}

pub fn revoke(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    grantee: &Address,
    privileges: Privileges,
    now: i64,
) -> Result<(), StorageError> {
    let before = Privileges::from_bits(current_bits(conn, chain_id, table_id, grantee)?);
    let after = before.revoke_bits(privileges);
    upsert_bits(conn, chain_id, table_id, grantee, after.bits(), now)
}

pub fn get(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    controller: &Address,
) -> Result<Privileges, StorageError> {
    Ok(Privileges::from_bits(current_bits(conn, chain_id, table_id, controller)?))
}

/// The ACL check used by RunSQL when no controller is bound (spec §4.5):
/// the caller must own an ACL row whose bitfield includes the operation's
/// bit.
pub fn check_privileges(
    conn: &Connection,
    chain_id: ChainId,
    table_id: &TableId,
    caller: &Address,
    op: Operation,
) -> Result<bool, StorageError> {
    let privileges = get(conn, chain_id, table_id, caller)?;
    Ok(privileges.contains(op))
}
