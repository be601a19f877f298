//! `BlockScope`: one DB transaction per chain block (spec §4.1/§4.2). Each
//! transaction of the block runs under its own SAVEPOINT so a per-event
//! failure only rolls back that transaction's writes, while an
//! infrastructure failure aborts the whole block.
//!
//! The commit/close state machine is enforced by ownership rather than a
//! runtime flag: both methods consume `self`, so a `BlockScope` that has
//! already been committed or closed cannot be used again, the compiler
//! rejects it. `Drop` still rolls back a scope that's abandoned without
//! either call (a panic mid-block, an early `?` return upstream).

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::OwnedSemaphorePermit;
use tracing::warn;

use tablesql_core::{ChainId, Event, EventErrorCode, SqlValidator, TableId, TxnEvents, TxnHash};

use crate::error::StorageError;
use crate::receipts::{self, Receipt};
use crate::txn_scope::TxnScope;

/// Result of executing one transaction's events against the block.
#[derive(Debug, Clone)]
pub struct TxnOutcome {
    pub txn_hash: TxnHash,
    pub table_id: Option<TableId>,
    pub error: Option<EventErrorCode>,
    pub error_event_idx: Option<i64>,
    /// `true` when the transaction's receipt already existed and its
    /// events were not re-executed (crash-recovery idempotency, spec §5).
    pub skipped: bool,
}

const SAVEPOINT_NAME: &str = "tl_txn";

pub struct BlockScope {
    conn: Arc<std::sync::Mutex<Connection>>,
    chain_id: ChainId,
    block_number: i64,
    max_table_row_count: i64,
    validator: Arc<dyn SqlValidator>,
    now: i64,
    next_index: i64,
    finished: bool,
    _write_permit: OwnedSemaphorePermit,
}

impl BlockScope {
    pub(crate) fn new(
        conn: Arc<std::sync::Mutex<Connection>>,
        chain_id: ChainId,
        block_number: i64,
        max_table_row_count: i64,
        validator: Arc<dyn SqlValidator>,
        now: i64,
        write_permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            conn,
            chain_id,
            block_number,
            max_table_row_count,
            validator,
            now,
            next_index: 0,
            finished: false,
            _write_permit: write_permit,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn block_number(&self) -> i64 {
        self.block_number
    }

    /// Executes one transaction's events in order under a `SAVEPOINT`.
    /// A per-event error rolls back that savepoint and records the
    /// failure in the receipt; the block transaction stays open. An
    /// infrastructure error propagates and the caller must `close` the
    /// block.
    pub async fn execute_txn_events(&mut self, txn: &TxnEvents) -> Result<TxnOutcome, StorageError> {
        let conn = self.conn.clone();
        let chain_id = self.chain_id;
        let block_number = self.block_number;
        let max_row = self.max_table_row_count;
        let validator = self.validator.clone();
        let now = self.now;
        let index_in_block = self.next_index;
        self.next_index += 1;
        let txn = txn.clone();

        crate::pool::run_blocking(conn, move |c| {
            run_one_txn(c, chain_id, block_number, max_row, validator.as_ref(), now, index_in_block, &txn)
        })
        .await
    }

    pub async fn set_last_processed_height(&mut self, block_number: i64) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let chain_id = self.chain_id;
        crate::pool::run_blocking(conn, move |c| receipts::set_last_processed_block(c, chain_id, block_number)).await
    }

    pub async fn txn_receipt_exists(&self, txn_hash: &TxnHash) -> Result<bool, StorageError> {
        let conn = self.conn.clone();
        let chain_id = self.chain_id;
        let txn_hash = txn_hash.clone();
        crate::pool::run_blocking(conn, move |c| receipts::exists(c, chain_id, &txn_hash)).await
    }

    pub async fn commit(mut self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        crate::pool::run_blocking(conn, |c| {
            c.execute_batch("COMMIT")?;
            Ok(())
        })
        .await?;
        self.finished = true;
        Ok(())
    }

    pub async fn close(mut self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        crate::pool::run_blocking(conn, |c| {
            c.execute_batch("ROLLBACK")?;
            Ok(())
        })
        .await?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for BlockScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.try_lock() {
            Ok(conn) => {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    warn!(error = %e, "failed to roll back abandoned block scope");
                } else {
                    warn!(chain_id = %self.chain_id, block_number = self.block_number, "block scope dropped without commit/close");
                }
            }
            Err(_) => warn!("block scope dropped without commit/close; connection busy"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_one_txn(
    conn: &Connection,
    chain_id: ChainId,
    block_number: i64,
    max_row: i64,
    validator: &dyn SqlValidator,
    now: i64,
    index_in_block: i64,
    txn: &TxnEvents,
) -> Result<TxnOutcome, StorageError> {
    if receipts::exists(conn, chain_id, &txn.txn_hash)? {
        return Ok(TxnOutcome {
            txn_hash: txn.txn_hash.clone(),
            table_id: None,
            error: None,
            error_event_idx: None,
            skipped: true,
        });
    }

    conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT_NAME}"))?;

    let scope = TxnScope::new(conn, chain_id, validator, max_row, now);
    let events: &[Event] = &txn.events;

    match scope.run(events, &txn.txn_hash, block_number) {
        Ok(exec) => {
            if exec.error.is_some() {
                conn.execute_batch(&format!("ROLLBACK TO SAVEPOINT {SAVEPOINT_NAME}"))?;
            }
            conn.execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT_NAME}"))?;

            receipts::insert(
                conn,
                &Receipt {
                    chain_id: chain_id.0 as i64,
                    txn_hash: txn.txn_hash.as_str().to_string(),
                    block_number,
                    index_in_block,
                    table_id: exec.table_id.as_ref().map(|t| t.as_str().to_string()),
                    error: exec.error.as_ref().map(|e| e.wire_code()),
                    error_event_idx: exec.error_event_idx.map(|i| i as i64),
                },
            )?;

            Ok(TxnOutcome {
                txn_hash: txn.txn_hash.clone(),
                table_id: exec.table_id,
                error: exec.error,
                error_event_idx: exec.error_event_idx.map(|i| i as i64),
                skipped: false,
            })
        }
        Err(core_err) => {
            let _ = conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {SAVEPOINT_NAME}; RELEASE SAVEPOINT {SAVEPOINT_NAME}"
            ));
            Err(StorageError::Other(core_err.to_string()))
        }
    }
}
