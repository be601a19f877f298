//! Error taxonomy (spec §7): per-event classifiable errors are reported
//! through the receipt and never propagate; infrastructure errors abort and
//! roll back the enclosing block, and propagate to the caller for retry.

use thiserror::Error;

/// Per-event, classifiable failure. Carries enough structure to be matched
/// on internally; `wire_code` renders the spec's prefixed string form for
/// persistence into `system_txn_receipts.error`.
#[derive(Debug, Clone, Error)]
pub enum EventErrorCode {
    #[error("query validation: {0}")]
    QueryValidation(String),

    #[error("acl: caller lacks required privilege")]
    Acl,

    #[error("acl: caller is not the table owner")]
    AclNotOwner,

    #[error("acl: unknown operation")]
    AclUnknownOperation,

    #[error("policy: {0}")]
    Policy(String),

    #[error("policy: updatable_columns does not cover the SET list")]
    PolicyCheckColumns,

    #[error("policy: failed to apply where_clause")]
    PolicyApplyWhereClause,

    #[error("policy: failed to apply RETURNING clause")]
    PolicyApplyReturningClause,

    #[error("number of affected rows {affected} does not match auditing count {audited}")]
    PolicyWithCheck { affected: i64, audited: i64 },

    #[error("table maximum row count exceeded (before {before}, after {after})")]
    RowCountLimit { before: i64, after: i64 },

    #[error("table lookup failed")]
    TableLookup,

    #[error("table prefix mismatch")]
    TablePrefix,

    #[error("table id is empty")]
    TableIdEmpty,

    #[error("SQLITE_{0}")]
    Sqlite(String),
}

impl EventErrorCode {
    /// The spec-mandated wire form stored in `system_txn_receipts.error`.
    pub fn wire_code(&self) -> String {
        match self {
            EventErrorCode::QueryValidation(msg) => format!("query validation: {msg}"),
            EventErrorCode::Acl => "ACL".to_string(),
            EventErrorCode::AclNotOwner => "ACL_NOT_OWNER".to_string(),
            EventErrorCode::AclUnknownOperation => "ACL_UNKNOWN_OPERATION".to_string(),
            EventErrorCode::Policy(msg) => format!("POLICY \"{msg}\""),
            EventErrorCode::PolicyCheckColumns => "POLICY_CHECK_COLUMNS".to_string(),
            EventErrorCode::PolicyApplyWhereClause => "POLICY_APPLY_WHERE_CLAUSE".to_string(),
            EventErrorCode::PolicyApplyReturningClause => {
                "POLICY_APPLY_RETURNING_CLAUSE".to_string()
            }
            EventErrorCode::PolicyWithCheck { affected, audited } => format!(
                "POLICY_WITH_CHECK: number of affected rows {affected} does not match auditing count {audited}"
            ),
            EventErrorCode::RowCountLimit { before, after } => format!(
                "ROW_COUNT_LIMIT: table maximum row count exceeded (before {before}, after {after})"
            ),
            EventErrorCode::TableLookup => "TABLE_LOOKUP".to_string(),
            EventErrorCode::TablePrefix => "TABLE_PREFIX".to_string(),
            EventErrorCode::TableIdEmpty => "TABLE_ID_EMPTY".to_string(),
            EventErrorCode::Sqlite(name) => format!("SQLITE_{name}"),
        }
    }
}

/// Infrastructure failure: aborts the whole block, rolls back, and is
/// returned to the caller, who must retry the block later.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("operation canceled")]
    Canceled,

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Classification set from spec §4.3.1/§4.3.2: SQLite result codes that are
/// *query-caused* (and therefore per-event errors) rather than
/// infrastructure failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteErrorClass {
    Error,
    Constraint,
    TooBig,
    Mismatch,
    /// Anything else: treated as an infrastructure error.
    Other,
}

impl SqliteErrorClass {
    pub fn is_query_caused(&self) -> bool {
        !matches!(self, SqliteErrorClass::Other)
    }

    pub fn errname(&self) -> &'static str {
        match self {
            SqliteErrorClass::Error => "ERROR",
            SqliteErrorClass::Constraint => "CONSTRAINT",
            SqliteErrorClass::TooBig => "TOOBIG",
            SqliteErrorClass::Mismatch => "MISMATCH",
            SqliteErrorClass::Other => "ERROR",
        }
    }
}
