//! Identity keys for matching the same violation across snapshots.
//!
//! A key is the composite `company_name|location|violation_law`. Stored
//! timelines were built with the verbatim composite, so [`ExactKey`] is the
//! default; cosmetic differences between snapshots (a trailing space, a
//! full-width character) therefore yield a spurious close + reopen pair.
//! Alternative strategies plug in through [`KeyStrategy`] without touching
//! the reconciler.

use serde::{Deserialize, Serialize};

use crate::record::{TimelineEntry, ViolationRecord};

pub const KEY_SEPARATOR: char = '|';

/// Composite identity of a violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three fields an identity is built from.
pub trait Identified {
    fn company_name(&self) -> &str;
    fn location(&self) -> &str;
    fn violation_law(&self) -> &str;
}

impl Identified for ViolationRecord {
    fn company_name(&self) -> &str {
        &self.company_name
    }
    fn location(&self) -> &str {
        &self.location
    }
    fn violation_law(&self) -> &str {
        &self.violation_law
    }
}

impl Identified for TimelineEntry {
    fn company_name(&self) -> &str {
        &self.company_name
    }
    fn location(&self) -> &str {
        &self.location
    }
    fn violation_law(&self) -> &str {
        &self.violation_law
    }
}

/// How identity keys are derived from rows.
pub trait KeyStrategy {
    /// Build a key from the three identity fields.
    fn compose(&self, company_name: &str, location: &str, violation_law: &str) -> IdentityKey;

    fn key_of<T: Identified + ?Sized>(&self, item: &T) -> IdentityKey {
        self.compose(item.company_name(), item.location(), item.violation_law())
    }
}

fn join(parts: [&str; 3]) -> IdentityKey {
    let mut s = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            s.push(KEY_SEPARATOR);
        }
        s.push_str(part);
    }
    IdentityKey(s)
}

/// Verbatim composite; compatible with every stored historical key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKey;

impl KeyStrategy for ExactKey {
    fn compose(&self, company_name: &str, location: &str, violation_law: &str) -> IdentityKey {
        join([company_name, location, violation_law])
    }
}

/// Composite of the whitespace-trimmed fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimmedKey;

impl KeyStrategy for TrimmedKey {
    fn compose(&self, company_name: &str, location: &str, violation_law: &str) -> IdentityKey {
        join([company_name.trim(), location.trim(), violation_law.trim()])
    }
}

/// Strategy selector for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    #[default]
    Exact,
    Trimmed,
}

impl KeyStrategy for KeyMode {
    fn compose(&self, company_name: &str, location: &str, violation_law: &str) -> IdentityKey {
        match self {
            Self::Exact => ExactKey.compose(company_name, location, violation_law),
            Self::Trimmed => TrimmedKey.compose(company_name, location, violation_law),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: &str, location: &str, law: &str) -> ViolationRecord {
        ViolationRecord {
            company_name: company.into(),
            location: location.into(),
            violation_law: law.into(),
            ..Default::default()
        }
    }

    #[test]
    fn exact_key_joins_with_pipes() {
        let key = ExactKey.key_of(&record("（株）ABC", "東京都", "労基法32条"));
        assert_eq!(key.as_str(), "（株）ABC|東京都|労基法32条");
    }

    #[test]
    fn missing_fields_become_empty_segments() {
        let key = ExactKey.key_of(&record("（株）ABC", "", ""));
        assert_eq!(key.as_str(), "（株）ABC||");
    }

    #[test]
    fn exact_key_keeps_whitespace_differences() {
        let a = ExactKey.key_of(&record("ABC", "東京都", "労基法32条"));
        let b = ExactKey.key_of(&record("ABC ", "東京都", "労基法32条"));
        assert_ne!(a, b);
    }

    #[test]
    fn trimmed_key_folds_edge_whitespace() {
        let a = TrimmedKey.key_of(&record("ABC", "東京都", "労基法32条"));
        let b = TrimmedKey.key_of(&record(" ABC ", "東京都 ", "労基法32条"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ABC|東京都|労基法32条");
    }

    #[test]
    fn timeline_entry_and_record_share_keys() {
        let rec = record("ABC", "大阪府", "最低賃金法第4条");
        let entry = TimelineEntry::opened(&rec, "2024-01-01".into());
        assert_eq!(KeyMode::Exact.key_of(&rec), KeyMode::Exact.key_of(&entry));
    }
}
