//! Schema definitions for the governance SurrealDB tables
//!
//! Tables:
//! - audit_log: hash-chained audit entries plus an archival flag

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::AuditLogEntry;

/// Module for serializing chrono DateTime to SurrealDB datetime format
pub(crate) mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Audit log row - one chained entry
///
/// `entry_id` carries the engine-assigned entry id; `id` is the SurrealDB
/// record id and is left to the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntryRecord {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub entry_id: String,
    /// Chain position (unique)
    pub sequence: u64,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
    pub principal_id: String,
    pub action: String,
    pub resource: String,
    pub resource_id: String,
    pub result: String,
    pub metadata: serde_json::Value,
    pub previous_hash: String,
    pub hash: String,
    /// Set by retention; excluded from the entry hash
    pub archived: bool,
}

impl AuditEntryRecord {
    /// Create a fresh, non-archived row from a chained entry
    pub fn from_entry(entry: &AuditLogEntry) -> Self {
        AuditEntryRecord {
            id: None,
            entry_id: entry.id.clone(),
            sequence: entry.sequence,
            timestamp: entry.timestamp,
            principal_id: entry.principal_id.clone(),
            action: entry.action.clone(),
            resource: entry.resource.clone(),
            resource_id: entry.resource_id.clone(),
            result: entry.result.clone(),
            metadata: entry.metadata.clone(),
            previous_hash: entry.previous_hash.clone(),
            hash: entry.hash.clone(),
            archived: false,
        }
    }

    /// Convert back into the storage-agnostic entry
    pub fn into_entry(self) -> AuditLogEntry {
        AuditLogEntry {
            id: self.entry_id,
            sequence: self.sequence,
            timestamp: self.timestamp,
            principal_id: self.principal_id,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            result: self.result,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            hash: self.hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_entry_fields() {
        let entry = AuditLogEntry {
            id: "e-1".to_string(),
            sequence: 7,
            timestamp: Utc::now(),
            principal_id: "svc-audit".to_string(),
            action: "DECISION_RECORDED".to_string(),
            resource: "decision_event".to_string(),
            resource_id: "dec-1".to_string(),
            result: "recorded".to_string(),
            metadata: serde_json::json!({"agent_id": "governance-audit-agent"}),
            previous_hash: "0".repeat(64),
            hash: "f".repeat(64),
        };

        let record = AuditEntryRecord::from_entry(&entry);
        assert!(!record.archived);
        assert!(record.id.is_none());
        assert_eq!(record.into_entry(), entry);
    }
}
