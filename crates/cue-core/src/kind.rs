//! The `Kind` bitmask lattice (`spec.md` §3).

use std::{
    fmt,
    ops::{BitAnd, BitOr},
};

/// A bitmask over `{null, bool, int, float, string, bytes, list, struct, bottom}`.
///
/// `Kind::BOTTOM` (the empty mask) is the bottom of the kind lattice;
/// `Kind::TOP` (all bits set) is the universal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Kind(u16);

impl Kind {
    pub const BOTTOM: Self = Self(0);
    pub const NULL: Self = Self(1 << 0);
    pub const BOOL: Self = Self(1 << 1);
    pub const INT: Self = Self(1 << 2);
    pub const FLOAT: Self = Self(1 << 3);
    pub const STRING: Self = Self(1 << 4);
    pub const BYTES: Self = Self(1 << 5);
    pub const LIST: Self = Self(1 << 6);
    pub const STRUCT: Self = Self(1 << 7);

    pub const NUM: Self = Self(Self::INT.0 | Self::FLOAT.0);
    pub const TOP: Self = Self(
        Self::NULL.0 | Self::BOOL.0 | Self::INT.0 | Self::FLOAT.0 | Self::STRING.0 | Self::BYTES.0 | Self::LIST.0 | Self::STRUCT.0,
    );

    /// Greatest lower bound (set intersection).
    #[must_use]
    pub fn meet(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Least upper bound (set union).
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub fn is_bottom(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_top(self) -> bool {
        self == Self::TOP
    }

    /// `true` iff `self` is a (non-strict) subset of `other` — every kind
    /// admitted by `self` is also admitted by `other`.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` iff `self` names exactly one scalar/structural kind.
    #[must_use]
    pub fn is_single(self) -> bool {
        self.0 != 0 && self.0 & (self.0 - 1) == 0
    }
}

impl BitAnd for Kind {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.meet(rhs)
    }
}

impl BitOr for Kind {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "_|_");
        }
        if self.is_top() {
            return write!(f, "_");
        }
        let names: &[(Kind, &str)] = &[
            (Self::NULL, "null"),
            (Self::BOOL, "bool"),
            (Self::INT, "int"),
            (Self::FLOAT, "float"),
            (Self::STRING, "string"),
            (Self::BYTES, "bytes"),
            (Self::LIST, "list"),
            (Self::STRUCT, "struct"),
        ];
        let parts: Vec<&str> = names.iter().filter(|(k, _)| self.contains(*k)).map(|(_, n)| *n).collect();
        write!(f, "{}", parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meet_is_intersection() {
        assert_eq!(Kind::NUM.meet(Kind::INT), Kind::INT);
        assert_eq!(Kind::INT.meet(Kind::STRING), Kind::BOTTOM);
    }

    #[test]
    fn top_is_identity_under_meet() {
        assert_eq!(Kind::TOP.meet(Kind::STRUCT), Kind::STRUCT);
    }

    #[test]
    fn bottom_absorbs_under_meet() {
        assert_eq!(Kind::BOTTOM.meet(Kind::STRUCT), Kind::BOTTOM);
    }
}
