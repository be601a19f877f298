//! The `SQLValidator` capability (spec §9): the engine holds this as an
//! injected trait object and never parses SQL itself. Implementations
//! (a real SQL-dialect validator, or a fake for tests) live outside this
//! crate.

use crate::acl::{Operation, Privileges};
use crate::ids::{Address, ChainId, TableId, TablePrefix};
use crate::structure::ColumnDef;

/// Result of validating a `CreateTable` statement.
#[derive(Debug, Clone)]
pub struct CreateStmt {
    /// The table name as written in the source statement, e.g. `foo_1337`
    /// (must end in `_{chainId}`, already checked by the validator).
    pub source_table_name: String,
    pub prefix: TablePrefix,
    pub columns: Vec<ColumnDef>,
}

/// One statement produced by validating a mutating query: either an ACL
/// grant/revoke, or a data-mutating write.
#[derive(Debug, Clone)]
pub enum StatementKind {
    Grant { grantee: Address, privileges: Privileges },
    Revoke { grantee: Address, privileges: Privileges },
    Write { op: Operation, sql: String },
}

#[derive(Debug, Clone)]
pub struct MutatingStmt {
    pub table_id: TableId,
    /// The prefix named in the statement, if any; must match the
    /// registry's prefix case-insensitively when present (§4.3.2 step 3).
    pub prefix: Option<String>,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Capability for validating and rewriting SQL text. Held by `TxnScope`;
/// never implemented in this crate, a dialect parser is out of scope (spec §1).
/// The policy-application methods are grouped here rather than on the
/// engine side because they require the same SQL-structural knowledge as
/// validation (locating the WHERE clause, the UPDATE SET list, whether a
/// RETURNING clause is already present); the engine only orchestrates
/// *when* to call them (spec §4.3.2/§4.4).
pub trait SqlValidator: Send + Sync {
    fn validate_create_table(
        &self,
        statement: &str,
        chain_id: ChainId,
    ) -> Result<CreateStmt, ValidationError>;

    fn validate_mutating_query(
        &self,
        statement: &str,
        chain_id: ChainId,
    ) -> Result<Vec<MutatingStmt>, ValidationError>;

    /// Columns named in an UPDATE statement's SET list, for the
    /// `updatable_columns` policy check.
    fn set_list_columns(&self, sql: &str) -> Result<Vec<String>, ValidationError>;

    /// AND-appends `extra_where` to the statement's WHERE clause (adding
    /// one if absent). Only defined for UPDATE/DELETE.
    fn apply_where_clause(&self, sql: &str, extra_where: &str) -> Result<String, ValidationError>;

    /// Adds `RETURNING rowid` to an INSERT/UPDATE statement so the engine
    /// can collect affected rowids for the auditing query (§4.3.2).
    fn apply_returning_rowid(&self, sql: &str) -> Result<String, ValidationError>;
}
