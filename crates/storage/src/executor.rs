//! `Executor`: owns the single write connection and the capacity-one write
//! permit that makes "exactly one writer at a time" a property of the type
//! system rather than a convention (spec §4.1, §9).

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::Semaphore;
use tokio::time::Duration;

use tablesql_core::{ChainId, SqlValidator};

use crate::block_scope::BlockScope;
use crate::error::StorageError;
use crate::receipts;

pub struct Executor {
    conn: Arc<Mutex<Connection>>,
    write_permit: Arc<Semaphore>,
    validator: Arc<dyn SqlValidator>,
    acquire_timeout: Duration,
}

impl Executor {
    /// Opens (creating if absent) the write connection and applies all
    /// embedded migrations.
    pub fn open(path: &str, validator: Arc<dyn SqlValidator>, acquire_timeout: Duration) -> Result<Self, StorageError> {
        let conn = crate::pool::open_write_connection(path)?;
        crate::migrations::apply_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            write_permit: Arc::new(Semaphore::new(1)),
            validator,
            acquire_timeout,
        })
    }

    /// Acquires the write permit and opens a new block-scoped transaction.
    /// Held for as long as the returned `BlockScope` lives; dropping or
    /// consuming it (`commit`/`close`) releases the permit automatically.
    pub async fn new_block_scope(
        &self,
        chain_id: ChainId,
        block_number: i64,
        max_table_row_count: i64,
        now: i64,
    ) -> Result<BlockScope, StorageError> {
        let permit = tokio::time::timeout(self.acquire_timeout, self.write_permit.clone().acquire_owned())
            .await
            .map_err(|_| StorageError::PermitUnavailable("timed out waiting for write permit".into()))?
            .map_err(|_| StorageError::Canceled)?;

        let conn = self.conn.clone();
        crate::pool::run_blocking(conn.clone(), |c| {
            c.execute_batch("BEGIN IMMEDIATE")?;
            Ok(())
        })
        .await?;

        Ok(BlockScope::new(conn, chain_id, block_number, max_table_row_count, self.validator.clone(), now, permit))
    }

    pub async fn last_executed_block_number(&self, chain_id: ChainId) -> Result<i64, StorageError> {
        let conn = self.conn.clone();
        crate::pool::run_blocking(conn, move |c| receipts::last_processed_block(c, chain_id)).await
    }

    pub(crate) fn write_conn(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}
