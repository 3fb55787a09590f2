//! Storage trait definitions for the governance audit log
//!
//! `AuditStore` is the only persistence abstraction the engine needs:
//! the audit chain writer appends already-hashed entries, readers run
//! ordered range queries, and retention flags old rows as archived.
//!
//! The trait is async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// AuditLogEntry
// ---------------------------------------------------------------------------

/// One link of the hash-chained audit log.
///
/// `hash` covers every field above it plus `previous_hash`; the store keeps
/// it verbatim so verification can recompute and compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry identifier
    pub id: String,
    /// 0-based insertion position in the chain
    pub sequence: u64,
    /// When the entry was chained (microsecond precision)
    pub timestamp: DateTime<Utc>,
    /// Who performed the action
    pub principal_id: String,
    /// Action name (e.g. "PERMISSION_GRANTED", "DECISION_RECORDED")
    pub action: String,
    /// Resource type the action applies to
    pub resource: String,
    /// Concrete resource identifier
    pub resource_id: String,
    /// Outcome label (e.g. "allowed", "denied", "recorded")
    pub result: String,
    /// Structured, action-specific context
    pub metadata: serde_json::Value,
    /// Hash of the preceding entry, or the genesis value
    pub previous_hash: String,
    /// Hash of this entry's content chained to `previous_hash`
    pub hash: String,
}

// ---------------------------------------------------------------------------
// AuditQuery
// ---------------------------------------------------------------------------

/// Filter for read-only audit queries. Results are ordered by `sequence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Inclusive lower timestamp bound
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper timestamp bound
    pub to: Option<DateTime<Utc>>,
    pub principal_id: Option<String>,
    pub action: Option<String>,
    pub resource_id: Option<String>,
    /// Include rows flagged by `archive_before`
    pub include_archived: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl AuditQuery {
    /// Query every entry, archived ones included.
    pub fn all() -> Self {
        Self {
            include_archived: true,
            ..Self::default()
        }
    }

    /// Query a closed timestamp range, archived ones included.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            include_archived: true,
            ..Self::default()
        }
    }

    pub fn with_principal(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn excluding_archived(mut self) -> Self {
        self.include_archived = false;
        self
    }

    /// Returns `true` if `entry` passes every filter (pagination excluded).
    pub fn matches(&self, entry: &AuditLogEntry, archived: bool) -> bool {
        if archived && !self.include_archived {
            return false;
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        if let Some(ref principal_id) = self.principal_id {
            if &entry.principal_id != principal_id {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(ref resource_id) = self.resource_id {
            if &entry.resource_id != resource_id {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// AuditStore
// ---------------------------------------------------------------------------

/// Append-only audit log storage.
///
/// Guarantees:
/// - `append` is atomic: either the entry is durably stored or an error is
///   returned and nothing is stored.
/// - A `sequence` can be written at most once (`SequenceConflict`).
/// - Entries are never deleted; `archive_before` only flags them.
/// - `query` returns entries ordered by ascending `sequence`.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably store a chained entry.
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()>;

    /// Entry with the highest sequence, if any.
    async fn head(&self) -> StorageResult<Option<AuditLogEntry>>;

    /// Entry at a given sequence, archived or not.
    async fn get(&self, sequence: u64) -> StorageResult<Option<AuditLogEntry>>;

    /// Entry by its id, archived or not.
    async fn get_by_id(&self, id: &str) -> StorageResult<Option<AuditLogEntry>>;

    /// Filtered, ordered read.
    async fn query(&self, query: &AuditQuery) -> StorageResult<Vec<AuditLogEntry>>;

    /// Flag every entry older than `cutoff` as archived. Returns how many rows
    /// changed state.
    async fn archive_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;
}
