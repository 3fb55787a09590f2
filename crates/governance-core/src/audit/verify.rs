//! Chain integrity verification.
//!
//! Violations are data: a tampered log yields an [`IntegrityReport`] with
//! `verified = false`, never an error.

use chrono::{DateTime, Utc};
use governance_state::AuditLogEntry;
use serde::{Deserialize, Serialize};

use crate::domain::error::codes;

use super::hashing::{compute_entry_hash, GENESIS_HASH};

/// One integrity problem found in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// Stored hash differs from the hash recomputed over the entry content
    HashMismatch {
        sequence: u64,
        entry_id: String,
        stored: String,
        computed: String,
    },
    /// `previous_hash` does not equal the stored hash of the predecessor
    ChainBreak {
        sequence: u64,
        entry_id: String,
        expected_previous: String,
        found_previous: String,
    },
    /// Sequence numbers are missing between two entries, or after the last
    /// stored one
    MissingEntries { first_missing: u64, last_missing: u64 },
    /// Newest stored entry is not the one the writer last chained
    HeadMismatch {
        sequence: u64,
        entry_id: String,
        expected: String,
        found: String,
    },
}

impl IntegrityViolation {
    pub fn code(&self) -> &'static str {
        codes::CHAIN_INTEGRITY_VIOLATION
    }

    /// Sequence the violation is reported against.
    pub fn sequence(&self) -> u64 {
        match self {
            IntegrityViolation::HashMismatch { sequence, .. }
            | IntegrityViolation::ChainBreak { sequence, .. }
            | IntegrityViolation::HeadMismatch { sequence, .. } => *sequence,
            IntegrityViolation::MissingEntries { first_missing, .. } => *first_missing,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IntegrityViolation::HashMismatch { .. } => "hash_mismatch",
            IntegrityViolation::ChainBreak { .. } => "chain_break",
            IntegrityViolation::MissingEntries { .. } => "missing_entries",
            IntegrityViolation::HeadMismatch { .. } => "head_mismatch",
        }
    }
}

/// Result of verifying a range of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub verified: bool,
    pub entries_checked: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn with_range(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }
}

/// What the first entry in a slice must chain to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predecessor {
    /// Slice starts at sequence 0
    Genesis,
    /// Stored hash of the entry just before the slice
    Hash(String),
    /// Entry just before the slice is not in the store
    Missing,
    /// Slice was read without context (e.g. an export); do not link-check
    /// its first entry unless it is sequence 0
    Unknown,
}

/// Verify an ordered slice of entries.
///
/// Every entry's hash is recomputed. Each link is checked against the
/// stored hash of the entry before it, so a tampered entry shows up as a
/// single `HashMismatch` without cascading into its successor. Across a
/// sequence gap the link is checked against the last surviving entry, so a
/// deletion reports both `MissingEntries` and a `ChainBreak`.
pub fn verify_entries(entries: &[AuditLogEntry], predecessor: Predecessor) -> IntegrityReport {
    let mut violations = Vec::new();
    let mut prev: Option<&AuditLogEntry> = None;

    for entry in entries {
        match compute_entry_hash(entry) {
            Ok(computed) if computed == entry.hash => {}
            Ok(computed) => violations.push(IntegrityViolation::HashMismatch {
                sequence: entry.sequence,
                entry_id: entry.id.clone(),
                stored: entry.hash.clone(),
                computed,
            }),
            Err(e) => violations.push(IntegrityViolation::HashMismatch {
                sequence: entry.sequence,
                entry_id: entry.id.clone(),
                stored: entry.hash.clone(),
                computed: format!("<unhashable: {e}>"),
            }),
        }

        let expected_previous: Option<String> = match prev {
            Some(p) if entry.sequence == p.sequence + 1 => Some(p.hash.clone()),
            Some(p) => {
                violations.push(IntegrityViolation::MissingEntries {
                    first_missing: p.sequence + 1,
                    last_missing: entry.sequence.saturating_sub(1),
                });
                Some(p.hash.clone())
            }
            None if entry.sequence == 0 => Some(GENESIS_HASH.to_string()),
            None => match &predecessor {
                Predecessor::Genesis => Some(GENESIS_HASH.to_string()),
                Predecessor::Hash(h) => Some(h.clone()),
                Predecessor::Missing => {
                    violations.push(IntegrityViolation::MissingEntries {
                        first_missing: entry.sequence - 1,
                        last_missing: entry.sequence - 1,
                    });
                    None
                }
                Predecessor::Unknown => None,
            },
        };

        if let Some(expected) = expected_previous {
            if expected != entry.previous_hash {
                violations.push(IntegrityViolation::ChainBreak {
                    sequence: entry.sequence,
                    entry_id: entry.id.clone(),
                    expected_previous: expected,
                    found_previous: entry.previous_hash.clone(),
                });
            }
        }

        prev = Some(entry);
    }

    IntegrityReport {
        verified: violations.is_empty(),
        entries_checked: entries.len() as u64,
        from: None,
        to: None,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: u64) -> Vec<AuditLogEntry> {
        let mut prev = GENESIS_HASH.to_string();
        (0..n)
            .map(|seq| {
                let mut e = AuditLogEntry {
                    id: format!("e-{seq}"),
                    sequence: seq,
                    timestamp: Utc::now(),
                    principal_id: "p".to_string(),
                    action: "DECISION_RECORDED".to_string(),
                    resource: "decision_event".to_string(),
                    resource_id: format!("d-{seq}"),
                    result: "recorded".to_string(),
                    metadata: serde_json::json!({}),
                    previous_hash: prev.clone(),
                    hash: String::new(),
                };
                e.hash = compute_entry_hash(&e).unwrap();
                prev = e.hash.clone();
                e
            })
            .collect()
    }

    #[test]
    fn test_clean_chain_verifies() {
        let report = verify_entries(&chain(4), Predecessor::Genesis);
        assert!(report.verified);
        assert_eq!(report.entries_checked, 4);
    }

    #[test]
    fn test_empty_slice_verifies() {
        let report = verify_entries(&[], Predecessor::Unknown);
        assert!(report.verified);
        assert_eq!(report.entries_checked, 0);
    }

    #[test]
    fn test_rewritten_hash_breaks_next_link() {
        let mut entries = chain(3);
        entries[1].result = "denied".to_string();
        entries[1].hash = compute_entry_hash(&entries[1]).unwrap();

        let report = verify_entries(&entries, Predecessor::Genesis);
        assert_eq!(report.violations.len(), 1);
        assert!(matches!(
            report.violations[0],
            IntegrityViolation::ChainBreak { sequence: 2, .. }
        ));
    }

    #[test]
    fn test_gap_is_missing_entries_and_chain_break() {
        let mut entries = chain(5);
        let removed = entries.remove(2);
        let report = verify_entries(&entries, Predecessor::Genesis);
        assert_eq!(
            report.violations,
            vec![
                IntegrityViolation::MissingEntries {
                    first_missing: 2,
                    last_missing: 2
                },
                IntegrityViolation::ChainBreak {
                    sequence: 3,
                    entry_id: "e-3".to_string(),
                    expected_previous: entries[1].hash.clone(),
                    found_previous: removed.hash,
                },
            ]
        );
    }

    #[test]
    fn test_slice_links_to_supplied_predecessor() {
        let entries = chain(4);
        let tail = &entries[2..];
        let ok = verify_entries(tail, Predecessor::Hash(entries[1].hash.clone()));
        assert!(ok.verified);

        let bad = verify_entries(tail, Predecessor::Hash("9".repeat(64)));
        assert_eq!(bad.violations.len(), 1);
        assert_eq!(bad.violations[0].kind(), "chain_break");

        let missing = verify_entries(tail, Predecessor::Missing);
        assert_eq!(missing.violations[0].kind(), "missing_entries");

        assert!(verify_entries(tail, Predecessor::Unknown).verified);
    }
}
