//! Append-only, hash-chained audit log.
//!
//! All appends go through one writer: a background task draining a bounded
//! queue, with the chain head behind a mutex. When the queue is saturated,
//! the writer is gone, or the queued write fails, the caller writes
//! synchronously through the same head lock. An entry is never dropped; if
//! the synchronous write fails too the caller gets a fatal
//! [`AuditError::AppendFailed`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use governance_state::{AuditLogEntry, AuditQuery, AuditStore, StorageError};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use crate::config::AuditConfig;
use crate::metrics::METRICS;
use crate::obs;

use super::error::AuditError;
use super::export::{export_entries, ComplianceReport, ExportFormat};
use super::hashing::{chain_timestamp, compute_entry_hash, GENESIS_HASH};
use super::verify::{verify_entries, IntegrityReport, IntegrityViolation, Predecessor};

/// Caller-supplied content of one audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFields {
    pub principal_id: String,
    pub action: String,
    pub resource: String,
    pub resource_id: String,
    pub result: String,
    pub metadata: serde_json::Value,
}

impl AuditFields {
    pub fn new(
        principal_id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        resource_id: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            action: action.into(),
            resource: resource.into(),
            resource_id: resource_id.into(),
            result: result.into(),
            metadata: serde_json::json!({}),
        }
    }

    /// Top-level `null` members are dropped; absent and null read the same
    /// and not every backend stores null object members.
    pub fn with_metadata(mut self, mut metadata: serde_json::Value) -> Self {
        if let Some(map) = metadata.as_object_mut() {
            map.retain(|_, v| !v.is_null());
        }
        self.metadata = metadata;
        self
    }
}

struct ChainHead {
    next_sequence: u64,
    previous_hash: String,
}

impl ChainHead {
    fn after(last: Option<AuditLogEntry>) -> Self {
        match last {
            Some(e) => Self {
                next_sequence: e.sequence + 1,
                previous_hash: e.hash,
            },
            None => Self {
                next_sequence: 0,
                previous_hash: GENESIS_HASH.to_string(),
            },
        }
    }
}

struct ChainCore {
    store: Arc<dyn AuditStore>,
    head: Mutex<ChainHead>,
}

impl ChainCore {
    /// Chain and persist one entry. The head only advances after the store
    /// accepted the write.
    async fn commit(&self, fields: &AuditFields) -> Result<AuditLogEntry, AuditError> {
        let mut head = self.head.lock().await;

        let mut entry = AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            sequence: head.next_sequence,
            timestamp: chain_timestamp(Utc::now()),
            principal_id: fields.principal_id.clone(),
            action: fields.action.clone(),
            resource: fields.resource.clone(),
            resource_id: fields.resource_id.clone(),
            result: fields.result.clone(),
            metadata: fields.metadata.clone(),
            previous_hash: head.previous_hash.clone(),
            hash: String::new(),
        };
        entry.hash = compute_entry_hash(&entry)?;

        match self.store.append(&entry).await {
            Ok(()) => {
                head.next_sequence += 1;
                head.previous_hash = entry.hash.clone();
                Ok(entry)
            }
            Err(StorageError::SequenceConflict { sequence }) => {
                // another writer owns this position; pick up its head for the retry
                warn!(sequence, "audit sequence conflict, resyncing chain head");
                *head = ChainHead::after(self.store.head().await?);
                Err(StorageError::SequenceConflict { sequence }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn committed_sequence(&self) -> u64 {
        self.head.lock().await.next_sequence
    }

    /// `(next_sequence, hash of the last chained entry)` at one instant.
    async fn snapshot(&self) -> (u64, String) {
        let head = self.head.lock().await;
        (head.next_sequence, head.previous_hash.clone())
    }

    /// Compare the newest committed entry in the store with the writer's
    /// head, catching deletion or rewrite of the tail.
    async fn check_tail(
        &self,
        committed: u64,
        head_hash: &str,
    ) -> Result<Option<IntegrityViolation>, AuditError> {
        let Some(last) = committed.checked_sub(1) else {
            return Ok(None);
        };
        match self.store.get(last).await? {
            Some(tail) if tail.hash == head_hash => Ok(None),
            Some(tail) => Ok(Some(IntegrityViolation::HeadMismatch {
                sequence: tail.sequence,
                entry_id: tail.id,
                expected: head_hash.to_string(),
                found: tail.hash,
            })),
            None => {
                let first_missing = match self.store.head().await? {
                    Some(h) if h.sequence < last => h.sequence + 1,
                    Some(_) => last,
                    None => 0,
                };
                Ok(Some(IntegrityViolation::MissingEntries {
                    first_missing,
                    last_missing: last,
                }))
            }
        }
    }
}

struct AppendRequest {
    fields: AuditFields,
    ack: oneshot::Sender<Result<AuditLogEntry, AuditError>>,
}

async fn writer_loop(core: Arc<ChainCore>, mut rx: mpsc::Receiver<AppendRequest>) {
    while let Some(req) = rx.recv().await {
        let result = core.commit(&req.fields).await;
        // caller may have given up; the entry is chained either way
        let _ = req.ack.send(result);
    }
    debug!("audit writer stopped");
}

/// Handle to the audit chain. Cheap to clone; all clones share one writer.
#[derive(Clone)]
pub struct AuditChain {
    core: Arc<ChainCore>,
    tx: mpsc::Sender<AppendRequest>,
}

impl AuditChain {
    /// Resume the chain from the store head and start the writer task.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open(store: Arc<dyn AuditStore>, config: &AuditConfig) -> Result<Self, AuditError> {
        let head = ChainHead::after(store.head().await?);
        debug!(
            next_sequence = head.next_sequence,
            "audit chain resumed from store head"
        );

        let core = Arc::new(ChainCore {
            store,
            head: Mutex::new(head),
        });
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(writer_loop(core.clone(), rx));
        Ok(Self { core, tx })
    }

    /// Append an entry; returns once it is durably chained.
    pub async fn append(&self, fields: AuditFields) -> Result<AuditLogEntry, AuditError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let request = AppendRequest {
            fields: fields.clone(),
            ack: ack_tx,
        };

        let fallback_reason = match self.tx.try_send(request) {
            Ok(()) => match ack_rx.await {
                Ok(Ok(entry)) => {
                    self.appended(&entry);
                    return Ok(entry);
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "audit writer dropped the request".to_string(),
            },
            Err(mpsc::error::TrySendError::Full(_)) => "audit queue saturated".to_string(),
            Err(mpsc::error::TrySendError::Closed(_)) => "audit writer stopped".to_string(),
        };

        obs::emit_audit_fallback(&fields.action, &fallback_reason);
        METRICS.inc_audit_fallbacks();

        match self.core.commit(&fields).await {
            Ok(entry) => {
                self.appended(&entry);
                Ok(entry)
            }
            Err(e) => {
                let err = AuditError::AppendFailed {
                    reason: format!("{fallback_reason}; synchronous write: {e}"),
                };
                obs::emit_audit_append_failed(&fields.action, &err);
                Err(err)
            }
        }
    }

    fn appended(&self, entry: &AuditLogEntry) {
        obs::emit_audit_appended(entry.sequence, &entry.action, &entry.principal_id);
        METRICS.inc_audit_appends();
    }

    /// Verify every committed entry with a timestamp in `[from, to]`.
    ///
    /// Archived entries are included. Entries chained after the call
    /// started are not examined. Without an upper bound the newest stored
    /// entry is also checked against the writer's chain head.
    pub async fn verify_integrity(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<IntegrityReport, AuditError> {
        let (committed, head_hash) = self.core.snapshot().await;
        let query = AuditQuery {
            from,
            to,
            include_archived: true,
            ..AuditQuery::default()
        };
        let entries: Vec<AuditLogEntry> = self
            .core
            .store
            .query(&query)
            .await?
            .into_iter()
            .filter(|e| e.sequence < committed)
            .collect();

        let predecessor = match entries.first() {
            None => Predecessor::Unknown,
            Some(first) => self.predecessor_of(first).await?,
        };

        let mut report = verify_entries(&entries, predecessor).with_range(from, to);
        if to.is_none() {
            if let Some(violation) = self.core.check_tail(committed, &head_hash).await? {
                report.violations.push(violation);
                report.verified = false;
            }
        }
        Ok(Self::reported(report))
    }

    /// Entry by id, archived or not.
    pub async fn get(&self, id: &str) -> Result<Option<AuditLogEntry>, AuditError> {
        Ok(self.core.store.get_by_id(id).await?)
    }

    /// Verify one entry's hash and its link to the stored predecessor.
    /// `None` if no entry has this id.
    pub async fn verify_entry(&self, id: &str) -> Result<Option<IntegrityReport>, AuditError> {
        let Some(entry) = self.get(id).await? else {
            return Ok(None);
        };
        let predecessor = self.predecessor_of(&entry).await?;
        let report = verify_entries(std::slice::from_ref(&entry), predecessor);
        Ok(Some(Self::reported(report)))
    }

    async fn predecessor_of(&self, entry: &AuditLogEntry) -> Result<Predecessor, AuditError> {
        let Some(prev_sequence) = entry.sequence.checked_sub(1) else {
            return Ok(Predecessor::Genesis);
        };
        Ok(match self.core.store.get(prev_sequence).await? {
            Some(prev) => Predecessor::Hash(prev.hash),
            None => Predecessor::Missing,
        })
    }

    fn reported(report: IntegrityReport) -> IntegrityReport {
        for v in &report.violations {
            obs::emit_integrity_violation(v);
        }
        METRICS.add_integrity_violations(report.violations.len() as u64);
        obs::emit_integrity_verified(report.entries_checked, report.violations.len());
        report
    }

    /// Read-only query, ordered by sequence.
    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, AuditError> {
        Ok(self.core.store.query(query).await?)
    }

    /// Entries with a timestamp in `[from, to]`, archived ones included.
    pub async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        self.query(&AuditQuery::between(from, to)).await
    }

    /// Flag entries older than `cutoff` as archived. Nothing is deleted and
    /// archived entries still verify.
    pub async fn archive_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AuditError> {
        let archived = self.core.store.archive_before(cutoff).await?;
        obs::emit_audit_archived(cutoff, archived);
        Ok(archived)
    }

    pub async fn export(
        &self,
        query: &AuditQuery,
        format: ExportFormat,
    ) -> Result<String, AuditError> {
        let entries = self.query(query).await?;
        export_entries(&entries, format)
    }

    pub async fn compliance_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ComplianceReport, AuditError> {
        let query = AuditQuery {
            from,
            to,
            include_archived: true,
            ..AuditQuery::default()
        };
        let entries = self.query(&query).await?;
        Ok(ComplianceReport::from_entries(from, to, &entries))
    }

    /// Sequence the next entry will receive.
    pub async fn next_sequence(&self) -> u64 {
        self.core.committed_sequence().await
    }
}
