//! Identifiers for the independent code lists.
//!
//! Sources are a closed set. Every SQL identifier used by the persistent
//! backend is derived from this enum and checked against [`ALLOWED_TABLES`]
//! before it is interpolated into a statement, so no caller-provided text
//! ever reaches a table name.

use std::fmt;

use crate::{PromoError, Result};

/// Number of independent code lists taking part in a quorum decision.
pub const SOURCE_COUNT: usize = 3;

/// Every table name the persistent backend may touch.
pub const ALLOWED_TABLES: [&str; SOURCE_COUNT] = ["source_1", "source_2", "source_3"];

const ALLOWED_INDEXES: [&str; SOURCE_COUNT] = ["idx_source_1_code", "idx_source_2_code", "idx_source_3_code"];

/// One of the numbered code lists (1..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    One,
    Two,
    Three,
}

impl SourceId {
    /// All sources in ascending order.
    pub const ALL: [SourceId; SOURCE_COUNT] = [SourceId::One, SourceId::Two, SourceId::Three];

    /// The 1-based source number.
    pub fn number(self) -> u32 {
        match self {
            SourceId::One => 1,
            SourceId::Two => 2,
            SourceId::Three => 3,
        }
    }

    /// Zero-based slot, usable as an array index.
    pub fn slot(self) -> usize {
        self.number() as usize - 1
    }

    pub fn table_name(self) -> &'static str {
        ALLOWED_TABLES[self.slot()]
    }

    pub fn index_name(self) -> &'static str {
        ALLOWED_INDEXES[self.slot()]
    }
}

impl TryFrom<u32> for SourceId {
    type Error = PromoError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(SourceId::One),
            2 => Ok(SourceId::Two),
            3 => Ok(SourceId::Three),
            other => Err(PromoError::invalid_source_id(other)),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source {}", self.number())
    }
}

/// Returns the table name for `source` after confirming it is on the allow-list.
pub fn checked_table_name(source: SourceId) -> Result<&'static str> {
    let name = source.table_name();
    if !is_allowed_table(name) {
        return Err(PromoError::invalid_parameter(format!("Table name not allowed: {}", name)));
    }
    Ok(name)
}

pub fn is_allowed_table(name: &str) -> bool {
    ALLOWED_TABLES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_accepts_only_known_sources() {
        assert_eq!(SourceId::try_from(1).unwrap(), SourceId::One);
        assert_eq!(SourceId::try_from(3).unwrap(), SourceId::Three);
        for bad in [0, 4, u32::MAX] {
            let err = SourceId::try_from(bad).unwrap_err();
            assert!(err.is_invalid_source_id(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_identifiers_are_allow_listed() {
        for source in SourceId::ALL {
            assert_eq!(checked_table_name(source).unwrap(), format!("source_{}", source.number()));
            assert!(source.index_name().starts_with("idx_source_"));
        }
        assert!(!is_allowed_table("source_1; DROP TABLE source_2"));
        assert!(!is_allowed_table("source_4"));
    }
}
