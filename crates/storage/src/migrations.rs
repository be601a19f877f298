//! Idempotent up-migration runner over a sequence-numbered, embedded
//! migration file convention.

use rusqlite::Connection;
use tracing::info;

use crate::error::StorageError;

/// One embedded migration file, numbered and named in applied order.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_system_tables",
    sql: include_str!("../migrations/0001_system_tables.sql"),
}];

/// Applies every embedded migration in order. Each migration is itself
/// written with `CREATE TABLE IF NOT EXISTS`, so re-running on an
/// already-migrated database is a no-op, which is what makes the runner
/// idempotent without a dedicated schema_migrations ledger.
pub fn apply_all(conn: &Connection) -> Result<Vec<&'static str>, StorageError> {
    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        info!(migration = migration.name, "applying migration");
        conn.execute_batch(migration.sql)
            .map_err(|e| StorageError::Migration(format!("{}: {e}", migration.name)))?;
        applied.push(migration.name);
    }
    Ok(applied)
}
