//! Structure hash: SHA-256 over the canonical `name:TYPE` column list,
//! used to group tables created from identical `CREATE TABLE` shapes
//! (spec §6.2). Deterministic across validators given the same column list.

use sha2::{Digest, Sha256};

/// One column of a validated `CREATE TABLE` statement.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

/// Canonical form: `{name}:{TYPE}` joined by `|`, lowercase name, uppercase
/// type, no whitespace, in declaration order.
pub fn canonical_form(columns: &[ColumnDef]) -> String {
    columns
        .iter()
        .map(|c| format!("{}:{}", c.name.to_lowercase(), c.sql_type.to_uppercase()))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn structure_hash(columns: &[ColumnDef]) -> String {
    let canonical = canonical_form(columns);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_columns() {
        let cols = vec![
            ColumnDef { name: "Zar".into(), sql_type: "text".into() },
            ColumnDef { name: "id".into(), sql_type: "INTEGER".into() },
        ];
        let h1 = structure_hash(&cols);
        let h2 = structure_hash(&cols.clone());
        assert_eq!(h1, h2);
        assert_eq!(canonical_form(&cols), "zar:TEXT|id:INTEGER");
    }

    #[test]
    fn differs_on_column_order() {
        let a = vec![
            ColumnDef { name: "a".into(), sql_type: "text".into() },
            ColumnDef { name: "b".into(), sql_type: "text".into() },
        ];
        let b = vec![
            ColumnDef { name: "b".into(), sql_type: "text".into() },
            ColumnDef { name: "a".into(), sql_type: "text".into() },
        ];
        assert_ne!(structure_hash(&a), structure_hash(&b));
    }
}
