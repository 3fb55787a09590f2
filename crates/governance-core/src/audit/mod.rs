//! Tamper-evident audit log.
//!
//! - `chain`: serialized writer, range queries, retention, verification entry point
//! - `hashing`: entry hash framing and the genesis value
//! - `verify`: pure integrity checks over an ordered slice of entries
//! - `export`: JSON/JSONL/CSV exports and compliance summaries

pub mod chain;
pub mod error;
pub mod export;
pub mod hashing;
pub mod verify;

pub use chain::{AuditChain, AuditFields};
pub use error::AuditError;
pub use export::{
    export_entries, parse_jsonl, to_csv, ComplianceReport, ExportFormat, CSV_HEADER,
};
pub use hashing::{chain_timestamp, compute_entry_hash, GENESIS_HASH};
pub use verify::{verify_entries, IntegrityReport, IntegrityViolation, Predecessor};

/// Action names written by the engine.
pub mod actions {
    pub const PERMISSION_GRANTED: &str = "PERMISSION_GRANTED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const DECISION_RECORDED: &str = "DECISION_RECORDED";
}
