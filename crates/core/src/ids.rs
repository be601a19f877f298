//! Identifiers and containers shared across the execution engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 64-bit EVM chain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(v: u64) -> Self {
        ChainId(v)
    }
}

/// On-chain table identifier. The contract mints ids that fit a 256-bit
/// unsigned integer; we keep the decimal string around since that's the
/// only representation the engine ever needs (naming, receipts, JSON).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(String);

impl TableId {
    /// Construct from a decimal string, rejecting anything that isn't a
    /// non-negative integer literal.
    pub fn parse(s: &str) -> Result<Self, TableIdError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TableIdError::NotDecimal);
        }
        // Normalize leading zeros so equality is numeric, not textual.
        let trimmed = s.trim_start_matches('0');
        let normalized = if trimmed.is_empty() { "0" } else { trimmed };
        Ok(TableId(normalized.to_string()))
    }

    pub fn from_u64(v: u64) -> Self {
        TableId(v.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableIdError {
    #[error("table id is not a decimal integer")]
    NotDecimal,
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 20-byte EVM address. Comparisons and storage are always lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| AddressError::Malformed)?;
        if bytes.len() != 20 {
            return Err(AddressError::Malformed);
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Lowercase hex, used as the canonical comparison/storage key.
    pub fn to_lowercase_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_lowercase_hex())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("malformed address")]
    Malformed,
}

/// 32-byte transaction hash, rendered 0x-hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnHash(String);

impl TxnHash {
    pub fn from_hex(s: &str) -> Self {
        let s = s.strip_prefix("0x").unwrap_or(s);
        TxnHash(format!("0x{}", s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-chosen table prefix: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TablePrefix(String);

impl TablePrefix {
    pub fn parse(s: &str) -> Result<Self, TablePrefixError> {
        let mut chars = s.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Err(TablePrefixError::Invalid),
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TablePrefixError::Invalid);
        }
        Ok(TablePrefix(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TablePrefixError {
    #[error("table prefix must match [A-Za-z_][A-Za-z0-9_]*")]
    Invalid,
}

impl fmt::Display for TablePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render the physical, fully-qualified table name `prefix_chainId_tableId`.
pub fn physical_table_name(prefix: &TablePrefix, chain_id: ChainId, table_id: &TableId) -> String {
    format!("{}_{}_{}", prefix.as_str(), chain_id, table_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_id_normalizes_leading_zeros() {
        let a = TableId::parse("042").unwrap();
        let b = TableId::parse("42").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn table_id_rejects_non_decimal() {
        assert!(TableId::parse("0x2a").is_err());
        assert!(TableId::parse("").is_err());
    }

    #[test]
    fn table_prefix_rejects_leading_digit() {
        assert!(TablePrefix::parse("1foo").is_err());
        assert!(TablePrefix::parse("_foo1").is_ok());
    }

    #[test]
    fn physical_name_matches_convention() {
        let p = TablePrefix::parse("foo").unwrap();
        let id = TableId::from_u64(42);
        assert_eq!(physical_table_name(&p, ChainId(1337), &id), "foo_1337_42");
    }

    #[test]
    fn address_round_trips_lowercase() {
        let a = Address::from_hex("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
        assert_eq!(a.to_lowercase_hex(), "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    }
}
