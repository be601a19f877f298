//! A minimal, convention-based `SqlValidator` implementation: token
//! splitting and brace matching, not a SQL dialect parser (one is
//! explicitly out of scope). It understands just enough of the statement
//! shapes the engine needs to recognize to drive a real deployment; a
//! production installation is expected to swap in a real parser behind the
//! same trait.

use tablesql_core::structure::ColumnDef;
use tablesql_core::{
    Address, ChainId, CreateStmt, MutatingStmt, Operation, Privileges, SqlValidator, StatementKind,
    TableId, TablePrefix, ValidationError,
};

pub struct BasicSqlValidator;

impl BasicSqlValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BasicSqlValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn err(msg: impl Into<String>) -> ValidationError {
    ValidationError(msg.into())
}

/// Splits `name` as `{prefix}_{chainId}_{tableId}`.
fn split_physical_name(name: &str) -> Option<(String, String, String)> {
    let mut parts = name.rsplitn(3, '_');
    let table_id = parts.next()?;
    let chain_id = parts.next()?;
    let prefix = parts.next()?;
    if prefix.is_empty() {
        return None;
    }
    Some((prefix.to_string(), chain_id.to_string(), table_id.to_string()))
}

/// Finds the span of a balanced `(...)` group starting at or after `from`.
fn find_paren_group(s: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let start = from + s[from..].find('(')?;
    let mut depth = 0i32;
    for (i, b) in bytes[start..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

fn find_keyword(s: &str, keyword: &str) -> Option<usize> {
    let upper = s.to_ascii_uppercase();
    let kw = keyword.to_ascii_uppercase();
    upper.find(&kw)
}

impl SqlValidator for BasicSqlValidator {
    fn validate_create_table(&self, statement: &str, chain_id: ChainId) -> Result<CreateStmt, ValidationError> {
        let stmt = statement.trim().trim_end_matches(';');
        let upper = stmt.to_ascii_uppercase();
        if !upper.starts_with("CREATE TABLE") {
            return Err(err("expected CREATE TABLE statement"));
        }

        let after_kw = &stmt[12..];
        let (paren_start, paren_end) = find_paren_group(stmt, 12).ok_or_else(|| err("missing column list"))?;
        let table_name = after_kw[..paren_start - 12].trim();
        if table_name.is_empty() {
            return Err(err("missing table name"));
        }

        let suffix = format!("_{chain_id}");
        let prefix_str = table_name
            .strip_suffix(&suffix)
            .ok_or_else(|| err(format!("table name must end in {suffix}")))?;
        let prefix = TablePrefix::parse(prefix_str).map_err(|e| err(e.to_string()))?;

        let columns_src = &stmt[paren_start + 1..paren_end - 1];
        let mut columns = Vec::new();
        for col in split_top_level(columns_src, ',') {
            let col = col.trim();
            if col.is_empty() {
                continue;
            }
            let mut tokens = col.split_whitespace();
            let name = tokens.next().ok_or_else(|| err("empty column definition"))?;
            let sql_type = tokens.next().unwrap_or("TEXT");
            columns.push(ColumnDef {
                name: name.to_string(),
                sql_type: sql_type.to_string(),
            });
        }
        if columns.is_empty() {
            return Err(err("table must declare at least one column"));
        }

        Ok(CreateStmt {
            source_table_name: table_name.to_string(),
            prefix,
            columns,
        })
    }

    fn validate_mutating_query(&self, statement: &str, chain_id: ChainId) -> Result<Vec<MutatingStmt>, ValidationError> {
        let mut out = Vec::new();
        for raw in statement.split(';') {
            let stmt = raw.trim();
            if stmt.is_empty() {
                continue;
            }
            out.push(parse_one_mutating_statement(stmt, chain_id)?);
        }
        if out.is_empty() {
            return Err(err("empty statement"));
        }
        Ok(out)
    }

    fn set_list_columns(&self, sql: &str) -> Result<Vec<String>, ValidationError> {
        let upper = sql.to_ascii_uppercase();
        let set_pos = find_keyword(sql, "SET").ok_or_else(|| err("expected SET clause"))?;
        let where_pos = upper[set_pos..].find("WHERE").map(|p| set_pos + p);
        let end = where_pos.unwrap_or(sql.len());
        let set_body = &sql[set_pos + 3..end];
        let mut columns = Vec::new();
        for assignment in split_top_level(set_body, ',') {
            let assignment = assignment.trim();
            if let Some((col, _)) = assignment.split_once('=') {
                columns.push(col.trim().to_string());
            }
        }
        Ok(columns)
    }

    fn apply_where_clause(&self, sql: &str, extra_where: &str) -> Result<String, ValidationError> {
        let trimmed = sql.trim().trim_end_matches(';');
        let upper = trimmed.to_ascii_uppercase();
        if let Some(pos) = upper.find("WHERE") {
            let (before, after) = trimmed.split_at(pos + 5);
            Ok(format!("{before} ({extra_where}) AND ({})", after.trim()))
        } else {
            Ok(format!("{trimmed} WHERE ({extra_where})"))
        }
    }

    fn apply_returning_rowid(&self, sql: &str) -> Result<String, ValidationError> {
        let trimmed = sql.trim().trim_end_matches(';');
        let upper = trimmed.to_ascii_uppercase();
        if upper.contains("RETURNING") {
            return Err(err("statement already has a RETURNING clause"));
        }
        Ok(format!("{trimmed} RETURNING rowid"))
    }
}

fn parse_one_mutating_statement(stmt: &str, chain_id: ChainId) -> Result<MutatingStmt, ValidationError> {
    let upper = stmt.to_ascii_uppercase();

    if upper.starts_with("GRANT") || upper.starts_with("REVOKE") {
        let is_grant = upper.starts_with("GRANT");
        let on_pos = find_keyword(stmt, "ON").ok_or_else(|| err("GRANT/REVOKE requires ON <table>"))?;
        let target_kw = if is_grant { "TO" } else { "FROM" };
        let target_pos = find_keyword(stmt, target_kw).ok_or_else(|| err("GRANT/REVOKE requires target clause"))?;

        let priv_list = stmt[stmt.len().min(if is_grant { 5 } else { 6 })..on_pos].trim();
        let table_token = stmt[on_pos + 2..target_pos].trim();
        let grantee_token = stmt[target_pos + target_kw.len()..].trim().trim_end_matches(';').trim();

        let (prefix, stmt_chain_id, table_id) = split_physical_name(table_token).ok_or_else(|| err("malformed table reference"))?;
        if stmt_chain_id != chain_id.to_string() {
            return Err(err("table reference targets a different chain"));
        }
        let table_id = TableId::parse(&table_id).map_err(|e| err(e.to_string()))?;
        let grantee = Address::from_hex(grantee_token).map_err(|e| err(e.to_string()))?;

        let mut privileges = Privileges::NONE;
        for p in priv_list.split(',') {
            let p = p.trim().to_ascii_uppercase();
            let op = match p.as_str() {
                "INSERT" => Operation::Insert,
                "UPDATE" => Operation::Update,
                "DELETE" => Operation::Delete,
                other => return Err(err(format!("unknown privilege {other}"))),
            };
            privileges = privileges.grant(op);
        }

        let kind = if is_grant {
            StatementKind::Grant { grantee, privileges }
        } else {
            StatementKind::Revoke { grantee, privileges }
        };

        return Ok(MutatingStmt {
            table_id,
            prefix: Some(prefix),
            kind,
        });
    }

    let (op, table_kw) = if upper.starts_with("INSERT") {
        (Operation::Insert, "INTO")
    } else if upper.starts_with("UPDATE") {
        (Operation::Update, "UPDATE")
    } else if upper.starts_with("DELETE") {
        (Operation::Delete, "FROM")
    } else {
        return Err(err("unrecognized statement kind"));
    };

    let kw_pos = find_keyword(stmt, table_kw).ok_or_else(|| err(format!("expected {table_kw} <table>")))?;
    let rest = &stmt[kw_pos + table_kw.len()..];
    let table_token = rest.split_whitespace().next().ok_or_else(|| err("missing table reference"))?;

    let (prefix, stmt_chain_id, table_id) = split_physical_name(table_token).ok_or_else(|| err("malformed table reference"))?;
    if stmt_chain_id != chain_id.to_string() {
        return Err(err("table reference targets a different chain"));
    }
    let table_id = TableId::parse(&table_id).map_err(|e| err(e.to_string()))?;

    Ok(MutatingStmt {
        table_id,
        prefix: Some(prefix),
        kind: StatementKind::Write { op, sql: stmt.to_string() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table() {
        let v = BasicSqlValidator::new();
        let stmt = v.validate_create_table("CREATE TABLE foo_1337 (id INTEGER PRIMARY KEY, name TEXT)", ChainId(1337)).unwrap();
        assert_eq!(stmt.prefix.as_str(), "foo");
        assert_eq!(stmt.columns.len(), 2);
    }

    #[test]
    fn parses_insert_statement() {
        let v = BasicSqlValidator::new();
        let stmts = v.validate_mutating_query("INSERT INTO foo_1337_42 (name) VALUES ('a')", ChainId(1337)).unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].table_id.as_str(), "42");
        assert!(matches!(stmts[0].kind, StatementKind::Write { op: Operation::Insert, .. }));
    }

    #[test]
    fn parses_grant_statement() {
        let v = BasicSqlValidator::new();
        let addr = "0x1111111111111111111111111111111111111111";
        let stmt = format!("GRANT INSERT,UPDATE ON foo_1337_42 TO {addr}");
        let stmts = v.validate_mutating_query(&stmt, ChainId(1337)).unwrap();
        match &stmts[0].kind {
            StatementKind::Grant { privileges, .. } => {
                assert!(privileges.contains(Operation::Insert));
                assert!(privileges.contains(Operation::Update));
                assert!(!privileges.contains(Operation::Delete));
            }
            _ => panic!("expected grant"),
        }
    }

    #[test]
    fn applies_where_clause_when_absent() {
        let v = BasicSqlValidator::new();
        let out = v.apply_where_clause("UPDATE foo_1337_42 SET name = 'x'", "owner = 1").unwrap();
        assert!(out.contains("WHERE (owner = 1)"));
    }

    #[test]
    fn applies_returning_rowid() {
        let v = BasicSqlValidator::new();
        let out = v.apply_returning_rowid("INSERT INTO foo_1337_42 (name) VALUES ('x')").unwrap();
        assert!(out.ends_with("RETURNING rowid"));
    }
}
