//! The controller policy engine (spec §4.4): pure checks against a
//! `Policy` record. SQL-text rewriting (WHERE injection, RETURNING
//! injection) is delegated to the `SqlValidator` capability, since it
//! requires the same structural knowledge as statement validation.

use std::collections::HashSet;

use tablesql_core::{EventErrorCode, Operation, Policy};

pub fn check_operation_allowed(policy: &Policy, op: Operation) -> Result<(), EventErrorCode> {
    let (allowed, msg) = match op {
        Operation::Insert => (policy.allow_insert, "insert is not allowed by policy"),
        Operation::Update => (policy.allow_update, "update is not allowed by policy"),
        Operation::Delete => (policy.allow_delete, "delete is not allowed by policy"),
    };
    if allowed {
        Ok(())
    } else {
        Err(EventErrorCode::Policy(msg.to_string()))
    }
}

/// `updatable_columns`, if non-empty, must be a superset of the columns
/// named in the UPDATE statement's SET list.
pub fn check_updatable_columns(policy: &Policy, set_columns: &[String]) -> Result<(), EventErrorCode> {
    if policy.updatable_columns.is_empty() {
        return Ok(());
    }
    let allowed: HashSet<&str> = policy.updatable_columns.iter().map(|s| s.as_str()).collect();
    if set_columns.iter().all(|c| allowed.contains(c.as_str())) {
        Ok(())
    } else {
        Err(EventErrorCode::PolicyCheckColumns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejected_when_policy_disallows() {
        let policy = Policy {
            allow_insert: false,
            ..Policy::default()
        };
        assert!(matches!(
            check_operation_allowed(&policy, Operation::Insert),
            Err(EventErrorCode::Policy(_))
        ));
    }

    #[test]
    fn updatable_columns_empty_means_unrestricted() {
        let policy = Policy::default();
        assert!(check_updatable_columns(&policy, &["anything".into()]).is_ok());
    }

    #[test]
    fn updatable_columns_rejects_extra_column() {
        let policy = Policy {
            updatable_columns: vec!["zar".into()],
            ..Policy::default()
        };
        assert!(check_updatable_columns(&policy, &["zar".into(), "other".into()]).is_err());
    }
}
