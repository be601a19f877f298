//! Read-only query facade over the system tables (spec §4.6), served from
//! the `ReadPool` rather than the write connection so reads never contend
//! with block execution.

use rusqlite::OptionalExtension;

use tablesql_core::{Address, ChainId, TableId, TxnHash};

use crate::error::StorageError;
use crate::pool::ReadPool;
use crate::receipts::{self, Receipt};
use crate::registry::{self, TableRow};

pub struct SystemService {
    read_pool: ReadPool,
}

impl SystemService {
    pub fn new(read_pool: ReadPool) -> Self {
        Self { read_pool }
    }

    pub async fn get_table_metadata(&self, chain_id: ChainId, table_id: TableId) -> Result<Option<TableRow>, StorageError> {
        self.read_pool.with_conn(move |c| registry::lookup(c, chain_id, &table_id)).await
    }

    pub async fn get_tables_by_controller(&self, chain_id: ChainId, controller: Address) -> Result<Vec<TableRow>, StorageError> {
        self.read_pool.with_conn(move |c| registry::by_controller(c, chain_id, &controller)).await
    }

    pub async fn get_tables_by_structure(&self, chain_id: ChainId, structure: String) -> Result<Vec<TableRow>, StorageError> {
        self.read_pool.with_conn(move |c| registry::by_structure(c, chain_id, &structure)).await
    }

    /// The `CREATE TABLE` statement SQLite itself recorded for a physical
    /// table, straight out of `sqlite_master`.
    pub async fn get_schema_by_table_name(&self, physical_table_name: String) -> Result<Option<String>, StorageError> {
        self.read_pool
            .with_conn(move |c| {
                c.query_row(
                    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [physical_table_name.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StorageError::from)
            })
            .await
    }

    pub async fn get_receipt_by_txn_hash(&self, chain_id: ChainId, txn_hash: TxnHash) -> Result<Option<Receipt>, StorageError> {
        self.read_pool.with_conn(move |c| receipts::get(c, chain_id, &txn_hash)).await
    }
}
