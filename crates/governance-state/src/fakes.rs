//! In-memory fakes for the audit store (testing only)
//!
//! `MemoryAuditStore` satisfies the `AuditStore` contract without external
//! dependencies and additionally exposes tamper hooks so tests can simulate
//! an attacker editing history behind the engine's back.
//! `FaultInjectingAuditStore` wraps another store and fails a configured
//! number of appends, for exercising the synchronous fallback path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryAuditStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredRow {
    entry: AuditLogEntry,
    archived: bool,
}

/// In-memory audit store backed by a `BTreeMap<sequence, row>`.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    rows: Mutex<BTreeMap<u64, StoredRow>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `entries`, stored as given.
    pub fn from_entries(entries: impl IntoIterator<Item = AuditLogEntry>) -> Self {
        let rows = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.sequence,
                    StoredRow {
                        entry,
                        archived: false,
                    },
                )
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }

    /// Replace the stored row at `entry.sequence` without any chain checks.
    ///
    /// Simulates an out-of-band edit of history.
    pub fn overwrite_entry(&self, entry: AuditLogEntry) {
        let mut rows = self.rows.lock().unwrap();
        let archived = rows
            .get(&entry.sequence)
            .map(|row| row.archived)
            .unwrap_or(false);
        rows.insert(entry.sequence, StoredRow { entry, archived });
    }

    /// Drop the stored row at `sequence`. Simulates an out-of-band deletion.
    pub fn remove_entry(&self, sequence: u64) -> Option<AuditLogEntry> {
        self.rows
            .lock()
            .unwrap()
            .remove(&sequence)
            .map(|row| row.entry)
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&entry.sequence) {
            return Err(StorageError::SequenceConflict {
                sequence: entry.sequence,
            });
        }
        rows.insert(
            entry.sequence,
            StoredRow {
                entry: entry.clone(),
                archived: false,
            },
        );
        Ok(())
    }

    async fn head(&self) -> StorageResult<Option<AuditLogEntry>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().next_back().map(|row| row.entry.clone()))
    }

    async fn get(&self, sequence: u64) -> StorageResult<Option<AuditLogEntry>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&sequence).map(|row| row.entry.clone()))
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<AuditLogEntry>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|row| row.entry.id == id)
            .map(|row| row.entry.clone()))
    }

    async fn query(&self, query: &AuditQuery) -> StorageResult<Vec<AuditLogEntry>> {
        let rows = self.rows.lock().unwrap();
        let matched = rows
            .values()
            .filter(|row| query.matches(&row.entry, row.archived))
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| row.entry.clone())
            .collect();
        Ok(matched)
    }

    async fn archive_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut archived = 0;
        for row in rows.values_mut() {
            if !row.archived && row.entry.timestamp < cutoff {
                row.archived = true;
                archived += 1;
            }
        }
        Ok(archived)
    }
}

// ---------------------------------------------------------------------------
// FaultInjectingAuditStore
// ---------------------------------------------------------------------------

/// Wraps another store and fails the next `n` appends with
/// `StorageError::Unavailable`. Reads always pass through.
pub struct FaultInjectingAuditStore {
    inner: Arc<dyn AuditStore>,
    failures_remaining: AtomicU64,
    failed_appends: AtomicU64,
}

impl FaultInjectingAuditStore {
    pub fn new(inner: Arc<dyn AuditStore>) -> Self {
        Self {
            inner,
            failures_remaining: AtomicU64::new(0),
            failed_appends: AtomicU64::new(0),
        }
    }

    /// Fail the next `n` append calls.
    pub fn fail_next(&self, n: u64) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// How many appends were rejected so far.
    pub fn failed_appends(&self) -> u64 {
        self.failed_appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditStore for FaultInjectingAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            self.failed_appends.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable(format!(
                "injected failure for sequence {}",
                entry.sequence
            )));
        }
        self.inner.append(entry).await
    }

    async fn head(&self) -> StorageResult<Option<AuditLogEntry>> {
        self.inner.head().await
    }

    async fn get(&self, sequence: u64) -> StorageResult<Option<AuditLogEntry>> {
        self.inner.get(sequence).await
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<AuditLogEntry>> {
        self.inner.get_by_id(id).await
    }

    async fn query(&self, query: &AuditQuery) -> StorageResult<Vec<AuditLogEntry>> {
        self.inner.query(query).await
    }

    async fn archive_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.archive_before(cutoff).await
    }
}
