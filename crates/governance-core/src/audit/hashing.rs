//! Entry hash framing.
//!
//! `hash = SHA-256(canonical_json(content) || previous_hash)` where
//! `content` is the object below and `previous_hash` is appended as its
//! ASCII hex bytes. The first entry chains to [`GENESIS_HASH`].
//!
//! ```text
//! {
//!   "id", "sequence", "timestamp" (RFC 3339, microseconds, Z),
//!   "principal_id", "action", "resource", "resource_id",
//!   "result", "metadata"
//! }
//! ```

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use governance_state::AuditLogEntry;
use sha2::{Digest, Sha256};

use crate::domain::digest::canonical_json;

use super::error::AuditError;

/// `previous_hash` of the entry at sequence 0.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Timestamps are chained at microsecond precision so every backend
/// round-trips them exactly.
pub fn chain_timestamp(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(6)
}

fn content(entry: &AuditLogEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "sequence": entry.sequence,
        "timestamp": entry.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        "principal_id": entry.principal_id,
        "action": entry.action,
        "resource": entry.resource,
        "resource_id": entry.resource_id,
        "result": entry.result,
        "metadata": entry.metadata,
    })
}

/// Hash of `entry`'s content chained to `entry.previous_hash`.
///
/// The stored `hash` field is ignored.
pub fn compute_entry_hash(entry: &AuditLogEntry) -> Result<String, AuditError> {
    let canonical =
        canonical_json(&content(entry)).map_err(|e| AuditError::Hashing(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(entry.previous_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AuditLogEntry {
        AuditLogEntry {
            id: "e-0".to_string(),
            sequence: 0,
            timestamp: DateTime::parse_from_rfc3339("2026-03-01T12:00:00.123456Z")
                .unwrap()
                .with_timezone(&Utc),
            principal_id: "user-1".to_string(),
            action: "PERMISSION_GRANTED".to_string(),
            resource: "policies".to_string(),
            resource_id: "pol-1".to_string(),
            result: "allowed".to_string(),
            metadata: serde_json::json!({"reason": "role_grant"}),
            previous_hash: GENESIS_HASH.to_string(),
            hash: String::new(),
        }
    }

    #[test]
    fn test_genesis_is_64_zeros() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.bytes().all(|b| b == b'0'));
    }

    #[test]
    fn test_hash_framing_is_pinned() {
        let e = entry();
        let expected_content = concat!(
            r#"{"action":"PERMISSION_GRANTED","id":"e-0","metadata":{"reason":"role_grant"},"#,
            r#""principal_id":"user-1","resource":"policies","resource_id":"pol-1","#,
            r#""result":"allowed","sequence":0,"timestamp":"2026-03-01T12:00:00.123456Z"}"#
        );
        assert_eq!(canonical_json(&content(&e)).unwrap(), expected_content);

        let mut hasher = Sha256::new();
        hasher.update(expected_content.as_bytes());
        hasher.update(GENESIS_HASH.as_bytes());
        assert_eq!(
            compute_entry_hash(&e).unwrap(),
            hex::encode(hasher.finalize())
        );
    }

    #[test]
    fn test_hash_covers_previous_hash_and_ignores_stored_hash() {
        let a = entry();
        let mut b = entry();
        b.hash = "f".repeat(64);
        assert_eq!(compute_entry_hash(&a).unwrap(), compute_entry_hash(&b).unwrap());

        b.previous_hash = "1".repeat(64);
        assert_ne!(compute_entry_hash(&a).unwrap(), compute_entry_hash(&b).unwrap());
    }

    #[test]
    fn test_chain_timestamp_truncates_to_micros() {
        let t = DateTime::parse_from_rfc3339("2026-03-01T12:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            chain_timestamp(t).to_rfc3339_opts(SecondsFormat::Nanos, true),
            "2026-03-01T12:00:00.123456000Z"
        );
    }
}
