//! The event input contract (spec §6.1): one EVM transaction carries an
//! ordered list of typed events, decoded directly from ABI logs into this
//! closed enum, dispatch is a `match`.

use serde::{Deserialize, Serialize};

use crate::ids::{Address, ChainId, TableId, TxnHash};

/// The controller-supplied policy record (`ITablelandControllerPolicy`).
/// Represented as a record-of-options rather than a nullable-address
/// pattern; `RunSql::controller_policy` is `None` when the table has no
/// controller bound, `Some(policy)` when one is and has been evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Policy {
    pub allow_insert: bool,
    pub allow_update: bool,
    pub allow_delete: bool,
    /// AND-appended to UPDATE/DELETE statements' WHERE clause, when non-empty.
    pub where_clause: String,
    /// Drives the auditing-query flow (§4.3.2) when non-empty.
    pub with_check: String,
    /// Non-empty means the SET list of an UPDATE must be a subset of this.
    pub updatable_columns: Vec<String>,
}

/// One of the four event types a `TxnScope` dispatches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CreateTable {
        /// `None` maps to the `TABLE_ID_EMPTY` per-event error.
        table_id: Option<TableId>,
        owner: Address,
        statement: String,
    },
    RunSql {
        is_owner: bool,
        caller: Address,
        table_id: TableId,
        statement: String,
        policy: Policy,
    },
    SetController {
        table_id: TableId,
        /// `Address::ZERO` means "unset".
        controller: Address,
    },
    TransferTable {
        table_id: TableId,
        from: Address,
        to: Address,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::CreateTable { .. } => "CreateTable",
            Event::RunSql { .. } => "RunSql",
            Event::SetController { .. } => "SetController",
            Event::TransferTable { .. } => "TransferTable",
        }
    }
}

/// All events emitted by one EVM transaction, in the order they must be
/// executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnEvents {
    pub txn_hash: TxnHash,
    pub events: Vec<Event>,
}

/// All transactions of one block, in the order they must be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEvents {
    pub chain_id: ChainId,
    pub block_number: i64,
    pub txns: Vec<TxnEvents>,
}
