//! SurrealDB-backed AuditStore implementation
//!
//! Uses `schema::AuditEntryRecord` for persistence, converting to/from
//! `storage_traits::AuditLogEntry` at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::handle::{self, CloudConfig, DEFAULT_LOCAL_PATH};
use crate::schema::AuditEntryRecord;
use crate::storage_traits::{AuditLogEntry, AuditQuery, AuditStore, StorageResult};

/// SurrealDB-backed implementation of [`AuditStore`].
pub struct SurrealAuditStore {
    db: Surreal<Any>,
}

impl SurrealAuditStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `governance/audit`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        let db = handle::connect_url("mem://").await?;
        info!("SurrealAuditStore connected (in-memory)");
        Ok(Self { db })
    }

    /// Create from environment variables.
    ///
    /// Tries cloud settings (`SURREALDB_ENDPOINT` ...), then `SURREALDB_URL`,
    /// then falls back to local persistence under `.governance/db`.
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            let db = handle::connect_cloud(&config).await?;
            info!("SurrealAuditStore connected (cloud)");
            return Ok(Self { db });
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let db = handle::connect_url(&url).await?;
            info!("SurrealAuditStore connected ({})", url);
            return Ok(Self { db });
        }

        std::fs::create_dir_all(DEFAULT_LOCAL_PATH).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                DEFAULT_LOCAL_PATH, e
            ))
        })?;
        let url = format!("surrealkv://{}", DEFAULT_LOCAL_PATH);
        info!(
            "No cloud config or SURREALDB_URL found, using local persistence: {}",
            url
        );
        let db = handle::connect_url(&url).await?;
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_by_sequence(&self, sequence: u64) -> StorageResult<Option<AuditEntryRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM audit_log WHERE sequence = $seq")
            .bind(("seq", sequence))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditEntryRecord> = res
            .take(0)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    /// Build the WHERE clause for a query; bind names match `bind_query`.
    fn where_clause(query: &AuditQuery) -> String {
        let mut conditions = Vec::new();
        if !query.include_archived {
            conditions.push("archived = false");
        }
        if query.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if query.to.is_some() {
            conditions.push("timestamp <= $to");
        }
        if query.principal_id.is_some() {
            conditions.push("principal_id = $principal_id");
        }
        if query.action.is_some() {
            conditions.push("action = $action");
        }
        if query.resource_id.is_some() {
            conditions.push("resource_id = $resource_id");
        }

        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

#[async_trait]
impl AuditStore for SurrealAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> StorageResult<()> {
        if self.fetch_by_sequence(entry.sequence).await?.is_some() {
            return Err(StorageError::SequenceConflict {
                sequence: entry.sequence,
            });
        }

        debug!(sequence = entry.sequence, entry_id = %entry.id, "appending audit entry");

        let _created: Option<AuditEntryRecord> = self
            .db
            .create("audit_log")
            .content(AuditEntryRecord::from_entry(entry))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn head(&self) -> StorageResult<Option<AuditLogEntry>> {
        let mut res = self
            .db
            .query("SELECT * FROM audit_log ORDER BY sequence DESC LIMIT 1")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditEntryRecord> = res
            .take(0)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(rows.into_iter().next().map(AuditEntryRecord::into_entry))
    }

    async fn get(&self, sequence: u64) -> StorageResult<Option<AuditLogEntry>> {
        Ok(self
            .fetch_by_sequence(sequence)
            .await?
            .map(AuditEntryRecord::into_entry))
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<AuditLogEntry>> {
        let mut res = self
            .db
            .query("SELECT * FROM audit_log WHERE entry_id = $entry_id")
            .bind(("entry_id", id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditEntryRecord> = res
            .take(0)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(rows.into_iter().next().map(AuditEntryRecord::into_entry))
    }

    async fn query(&self, query: &AuditQuery) -> StorageResult<Vec<AuditLogEntry>> {
        let mut sql = format!(
            "SELECT * FROM audit_log{} ORDER BY sequence ASC",
            Self::where_clause(query)
        );
        if query.limit.is_some() {
            sql.push_str(" LIMIT $limit");
        }
        if query.offset > 0 {
            sql.push_str(" START $offset");
        }

        let mut request = self.db.query(sql);
        if let Some(from) = query.from {
            request = request.bind(("from", SurrealDatetime::from(from)));
        }
        if let Some(to) = query.to {
            request = request.bind(("to", SurrealDatetime::from(to)));
        }
        if let Some(ref principal_id) = query.principal_id {
            request = request.bind(("principal_id", principal_id.clone()));
        }
        if let Some(ref action) = query.action {
            request = request.bind(("action", action.clone()));
        }
        if let Some(ref resource_id) = query.resource_id {
            request = request.bind(("resource_id", resource_id.clone()));
        }
        if let Some(limit) = query.limit {
            request = request.bind(("limit", limit as u64));
        }
        if query.offset > 0 {
            request = request.bind(("offset", query.offset as u64));
        }

        let mut res = request
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditEntryRecord> = res
            .take(0)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(rows.into_iter().map(AuditEntryRecord::into_entry).collect())
    }

    async fn archive_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let mut res = self
            .db
            .query(
                "UPDATE audit_log SET archived = true \
                 WHERE archived = false AND timestamp < $cutoff RETURN AFTER",
            )
            .bind(("cutoff", SurrealDatetime::from(cutoff)))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditEntryRecord> = res
            .take(0)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_is_empty_for_unfiltered_archived_query() {
        assert_eq!(SurrealAuditStore::where_clause(&AuditQuery::all()), "");
    }

    #[test]
    fn where_clause_joins_filters() {
        let query = AuditQuery::default()
            .with_principal("alice")
            .with_action("PERMISSION_DENIED");
        assert_eq!(
            SurrealAuditStore::where_clause(&query),
            " WHERE archived = false AND principal_id = $principal_id AND action = $action"
        );
    }
}
