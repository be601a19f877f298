//! `TxnScope`: sequential dispatch and execution of the events in one EVM
//! transaction (spec §4.3, the core of the core). Entirely synchronous:
//! the owning `BlockScope` drives it from inside one blocking-pool task so
//! that "events execute strictly in order" needs no extra synchronization.

use rusqlite::Connection;
use tracing::warn;

use tablesql_core::{
    Address, ChainId, CoreError, Event, EventErrorCode, Operation, Policy, SqlValidator,
    StatementKind, TableId,
};

use crate::error::{classify, StorageError};
use crate::{acl_store, controller, event_journal, policy as policy_engine, registry};

/// Outcome of one handler: either it ran to completion, it failed with a
/// classifiable per-event error, or it hit an infrastructure failure that
/// must abort the whole block.
pub enum Dispatch<T> {
    Ok(T),
    PerEvent(EventErrorCode),
    Infra(CoreError),
}

/// Result of executing every event of one transaction (spec §4.2/§4.3).
pub struct TxnExecResult {
    pub table_id: Option<TableId>,
    pub error: Option<EventErrorCode>,
    pub error_event_idx: Option<usize>,
}

pub struct TxnScope<'a> {
    conn: &'a Connection,
    chain_id: ChainId,
    validator: &'a dyn SqlValidator,
    max_table_row_count: i64,
    now: i64,
}

impl<'a> TxnScope<'a> {
    pub fn new(
        conn: &'a Connection,
        chain_id: ChainId,
        validator: &'a dyn SqlValidator,
        max_table_row_count: i64,
        now: i64,
    ) -> Self {
        Self {
            conn,
            chain_id,
            validator,
            max_table_row_count,
            now,
        }
    }

    /// Dispatches `events[0..]` in order; stops at the first per-event
    /// failure (spec §4.3). Infrastructure errors propagate immediately.
    pub fn run(&self, events: &[Event], tx_hash: &tablesql_core::TxnHash, block_number: i64) -> Result<TxnExecResult, CoreError> {
        for (i, event) in events.iter().enumerate() {
            if let Err(e) = event_journal::append(self.conn, self.chain_id, tx_hash, i as i64, event, block_number) {
                return Err(e.into());
            }

            let table_id = event_table_id(event);
            match self.dispatch(event) {
                Dispatch::Ok(()) => continue,
                Dispatch::PerEvent(err) => {
                    return Ok(TxnExecResult {
                        table_id,
                        error: Some(err),
                        error_event_idx: Some(i),
                    });
                }
                Dispatch::Infra(err) => return Err(err),
            }
        }

        Ok(TxnExecResult {
            table_id: events.iter().rev().find_map(event_table_id),
            error: None,
            error_event_idx: None,
        })
    }

    fn dispatch(&self, event: &Event) -> Dispatch<()> {
        match event {
            Event::CreateTable { table_id, owner, statement } => {
                self.create_table(table_id.as_ref(), owner, statement)
            }
            Event::RunSql { is_owner, caller, table_id, statement, policy } => {
                self.run_sql(*is_owner, caller, table_id, statement, policy)
            }
            Event::SetController { table_id, controller } => {
                self.set_controller(table_id, controller)
            }
            Event::TransferTable { table_id, from, to } => self.transfer_table(table_id, from, to),
        }
    }

    // ---- §4.3.1 CreateTable ----------------------------------------

    fn create_table(&self, table_id: Option<&TableId>, owner: &Address, statement: &str) -> Dispatch<()> {
        let Some(table_id) = table_id else {
            return Dispatch::PerEvent(EventErrorCode::TableIdEmpty);
        };

        let create_stmt = match self.validator.validate_create_table(statement, self.chain_id) {
            Ok(s) => s,
            Err(e) => return Dispatch::PerEvent(EventErrorCode::QueryValidation(e.0)),
        };

        let structure = tablesql_core::structure::structure_hash(&create_stmt.columns);

        // registry + system_acl are written before the physical DDL so
        // that an intra-DDL failure still leaves both system tables
        // consistent with each other inside the (to-be-rolled-back)
        // savepoint (spec design notes).
        if let Err(e) = registry::insert(self.conn, self.chain_id, table_id, owner, &create_stmt.prefix, &structure, self.now) {
            return sqlite_outcome(e);
        }
        if let Err(e) = acl_store::seed_owner(self.conn, self.chain_id, table_id, owner, self.now) {
            return sqlite_outcome(e);
        }

        let physical_name = tablesql_core::ids::physical_table_name(&create_stmt.prefix, self.chain_id, table_id);
        let rewritten = statement.replacen(&create_stmt.source_table_name, &physical_name, 1);

        match self.conn.execute_batch(&rewritten) {
            Ok(()) => Dispatch::Ok(()),
            Err(e) => sqlite_outcome(e),
        }
    }

    // ---- §4.3.2 RunSQL ----------------------------------------------

    fn run_sql(
        &self,
        is_owner: bool,
        caller: &Address,
        event_table_id: &TableId,
        statement: &str,
        policy: &Policy,
    ) -> Dispatch<()> {
        let statements = match self.validator.validate_mutating_query(statement, self.chain_id) {
            Ok(s) => s,
            Err(e) => return Dispatch::PerEvent(EventErrorCode::QueryValidation(e.0)),
        };

        match statements.first() {
            Some(first) if &first.table_id != event_table_id => {
                return Dispatch::PerEvent(EventErrorCode::TableLookup);
            }
            None => return Dispatch::PerEvent(EventErrorCode::TableLookup),
            _ => {}
        }

        for stmt in &statements {
            let row = match registry::lookup(self.conn, self.chain_id, &stmt.table_id) {
                Ok(Some(row)) => row,
                Ok(None) => return Dispatch::PerEvent(EventErrorCode::TableLookup),
                Err(e) => return sqlite_outcome_storage(e),
            };

            if let Some(prefix) = &stmt.prefix {
                if !prefix.eq_ignore_ascii_case(&row.prefix) {
                    return Dispatch::PerEvent(EventErrorCode::TablePrefix);
                }
            }

            match &stmt.kind {
                StatementKind::Grant { grantee, privileges } => {
                    if !is_owner {
                        return Dispatch::PerEvent(EventErrorCode::AclNotOwner);
                    }
                    if let Err(e) = acl_store::grant(self.conn, self.chain_id, &stmt.table_id, grantee, *privileges, self.now) {
                        return sqlite_outcome_storage(e);
                    }
                }
                StatementKind::Revoke { grantee, privileges } => {
                    if !is_owner {
                        return Dispatch::PerEvent(EventErrorCode::AclNotOwner);
                    }
                    if let Err(e) = acl_store::revoke(self.conn, self.chain_id, &stmt.table_id, grantee, *privileges, self.now) {
                        return sqlite_outcome_storage(e);
                    }
                }
                StatementKind::Write { op, sql } => {
                    match self.dispatch_write(caller, &stmt.table_id, &row, *op, sql, policy) {
                        Dispatch::Ok(()) => {}
                        other => return other,
                    }
                }
            }
        }

        Dispatch::Ok(())
    }

    fn dispatch_write(
        &self,
        caller: &Address,
        table_id: &TableId,
        row: &registry::TableRow,
        op: Operation,
        sql: &str,
        policy: &Policy,
    ) -> Dispatch<()> {
        let bound_controller = match controller::get(self.conn, self.chain_id, table_id) {
            Ok(c) => c,
            Err(e) => return sqlite_outcome_storage(e),
        };

        let mut sql = sql.to_string();

        if bound_controller.is_some() {
            if let Err(e) = policy_engine::check_operation_allowed(policy, op) {
                return Dispatch::PerEvent(e);
            }
            if op == Operation::Update {
                let set_columns = match self.validator.set_list_columns(&sql) {
                    Ok(cols) => cols,
                    Err(e) => return Dispatch::PerEvent(EventErrorCode::QueryValidation(e.0)),
                };
                if let Err(e) = policy_engine::check_updatable_columns(policy, &set_columns) {
                    return Dispatch::PerEvent(e);
                }
            }
            if !policy.where_clause.is_empty() && matches!(op, Operation::Update | Operation::Delete) {
                sql = match self.validator.apply_where_clause(&sql, &policy.where_clause) {
                    Ok(s) => s,
                    Err(_) => return Dispatch::PerEvent(EventErrorCode::PolicyApplyWhereClause),
                };
            }
        } else {
            match acl_store::check_privileges(self.conn, self.chain_id, table_id, caller, op) {
                Ok(true) => {}
                Ok(false) => return Dispatch::PerEvent(EventErrorCode::Acl),
                Err(e) => return sqlite_outcome_storage(e),
            }
        }

        let physical_name = tablesql_core::ids::physical_table_name(
            &match tablesql_core::TablePrefix::parse(&row.prefix) {
                Ok(p) => p,
                Err(_) => return Dispatch::Infra(CoreError::Other("corrupt registry prefix".into())),
            },
            self.chain_id,
            table_id,
        );

        let before_count = match registry::physical_row_count(self.conn, &physical_name) {
            Ok(c) => c,
            Err(e) => return sqlite_outcome_storage(e),
        };

        let with_check_active = bound_controller.is_some() && !policy.with_check.is_empty();

        let affected: i64 = if with_check_active {
            if op == Operation::Delete {
                warn!(table_id = %table_id, "policy.with_check on DELETE is unsupported; rejecting");
                return Dispatch::PerEvent(EventErrorCode::PolicyApplyReturningClause);
            }

            let returning_sql = match self.validator.apply_returning_rowid(&sql) {
                Ok(s) => s,
                Err(_) => return Dispatch::PerEvent(EventErrorCode::PolicyApplyReturningClause),
            };

            let rowids: Vec<i64> = {
                let mut stmt = match self.conn.prepare(&returning_sql) {
                    Ok(s) => s,
                    Err(e) => return sqlite_outcome(e),
                };
                let mapped = stmt.query_map([], |r| r.get::<_, i64>(0)).and_then(|rows| rows.collect::<Result<Vec<_>, _>>());
                match mapped {
                    Ok(v) => v,
                    Err(e) => return sqlite_outcome(e),
                }
            };
            let affected = rowids.len() as i64;

            let audited = match audit_with_check(self.conn, &physical_name, &policy.with_check, &rowids) {
                Ok(c) => c,
                Err(e) => return sqlite_outcome(e),
            };

            if audited != affected {
                return Dispatch::PerEvent(EventErrorCode::PolicyWithCheck { affected, audited });
            }
            affected
        } else {
            match self.conn.execute(&sql, []) {
                Ok(n) => n as i64,
                Err(e) => return sqlite_outcome(e),
            }
        };

        if op == Operation::Insert && self.max_table_row_count > 0 {
            let after = before_count + affected;
            if after > self.max_table_row_count {
                return Dispatch::PerEvent(EventErrorCode::RowCountLimit { before: before_count, after });
            }
        }

        Dispatch::Ok(())
    }

    // ---- §4.3.3 SetController -----------------------------------------

    fn set_controller(&self, table_id: &TableId, new_controller: &Address) -> Dispatch<()> {
        let result = if new_controller.is_zero() {
            controller::unset(self.conn, self.chain_id, table_id)
        } else {
            controller::set(self.conn, self.chain_id, table_id, new_controller, self.now)
        };
        match result {
            Ok(()) => Dispatch::Ok(()),
            Err(StorageError::Sqlite(e)) => sqlite_outcome(e),
            Err(e) => Dispatch::Infra(e.into()),
        }
    }

    // ---- §4.3.4 TransferTable ------------------------------------------

    fn transfer_table(&self, table_id: &TableId, from: &Address, to: &Address) -> Dispatch<()> {
        if let Err(e) = registry::set_controller(self.conn, self.chain_id, table_id, to) {
            return sqlite_outcome_storage(e);
        }
        if let Err(e) = acl_store::revoke(self.conn, self.chain_id, table_id, from, tablesql_core::Privileges::ALL, self.now) {
            return sqlite_outcome_storage(e);
        }
        if let Err(e) = acl_store::grant(self.conn, self.chain_id, table_id, to, tablesql_core::Privileges::ALL, self.now) {
            return sqlite_outcome_storage(e);
        }
        Dispatch::Ok(())
    }
}

fn event_table_id(event: &Event) -> Option<TableId> {
    match event {
        Event::CreateTable { table_id, .. } => table_id.clone(),
        Event::RunSql { table_id, .. } => Some(table_id.clone()),
        Event::SetController { table_id, .. } => Some(table_id.clone()),
        Event::TransferTable { table_id, .. } => Some(table_id.clone()),
    }
}

/// Builds and runs the auditing query (spec §4.3.2/glossary): verifies
/// every written row satisfies `with_check`.
fn audit_with_check(
    conn: &Connection,
    physical_name: &str,
    with_check: &str,
    rowids: &[i64],
) -> rusqlite::Result<i64> {
    if rowids.is_empty() {
        return Ok(0);
    }
    let ids = rowids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT count(1) FROM \"{physical_name}\" WHERE ({with_check}) AND rowid IN ({ids}) LIMIT 1"
    );
    conn.query_row(&sql, [], |row| row.get(0))
}

fn sqlite_outcome(err: rusqlite::Error) -> Dispatch<()> {
    let class = classify(&err);
    if class.is_query_caused() {
        Dispatch::PerEvent(EventErrorCode::Sqlite(class.errname().to_string()))
    } else {
        Dispatch::Infra(CoreError::Database(err.to_string()))
    }
}

fn sqlite_outcome_storage(err: StorageError) -> Dispatch<()> {
    match err {
        StorageError::Sqlite(e) => sqlite_outcome(e),
        other => Dispatch::Infra(other.into()),
    }
}
