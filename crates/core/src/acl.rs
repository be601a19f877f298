//! ACL bitfield: a trivial sum-type over the three mutating operations,
//! expressed as a typed flag set rather than a bare integer (spec §9).

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privileges(u8);

impl Privileges {
    pub const NONE: Privileges = Privileges(0);
    pub const INSERT: Privileges = Privileges(1);
    pub const UPDATE: Privileges = Privileges(2);
    pub const DELETE: Privileges = Privileges(4);
    pub const ALL: Privileges = Privileges(1 | 2 | 4);

    pub fn from_bits(bits: i64) -> Self {
        Privileges((bits & 0b111) as u8)
    }

    pub fn bits(&self) -> i64 {
        self.0 as i64
    }

    pub fn contains(&self, op: Operation) -> bool {
        self.0 & op.bit().0 != 0
    }

    /// GRANT semantics: OR-merge the bitfield.
    pub fn grant(self, op: Operation) -> Self {
        self | op.bit()
    }

    /// REVOKE semantics: AND-clear the bitfield.
    pub fn revoke(self, op: Operation) -> Self {
        Privileges(self.0 & !op.bit().0)
    }

    /// AND-clears every bit set in `mask` (used when the mask itself is a
    /// bitfield already combining INSERT|UPDATE|DELETE, e.g. ownership
    /// transfer).
    pub fn revoke_bits(self, mask: Privileges) -> Self {
        Privileges(self.0 & !mask.0)
    }
}

impl BitOr for Privileges {
    type Output = Privileges;
    fn bitor(self, rhs: Privileges) -> Privileges {
        Privileges(self.0 | rhs.0)
    }
}

impl BitOrAssign for Privileges {
    fn bitor_assign(&mut self, rhs: Privileges) {
        self.0 |= rhs.0;
    }
}

/// The mutating operations an ACL entry or policy can grant/check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    fn bit(&self) -> Privileges {
        match self {
            Operation::Insert => Privileges::INSERT,
            Operation::Update => Privileges::UPDATE,
            Operation::Delete => Privileges::DELETE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_or_merges() {
        let p = Privileges::NONE.grant(Operation::Insert).grant(Operation::Update);
        assert!(p.contains(Operation::Insert));
        assert!(p.contains(Operation::Update));
        assert!(!p.contains(Operation::Delete));
    }

    #[test]
    fn revoke_and_clears() {
        let p = Privileges::ALL.revoke(Operation::Delete);
        assert!(p.contains(Operation::Insert));
        assert!(!p.contains(Operation::Delete));
    }

    #[test]
    fn zero_bitfield_means_no_privileges() {
        assert!(!Privileges::NONE.contains(Operation::Insert));
    }
}
