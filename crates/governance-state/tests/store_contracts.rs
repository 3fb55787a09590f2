//! Trait contract tests for AuditStore.
//!
//! Every conforming implementation must pass these. Each contract is run
//! against the in-memory fake and the SurrealDB `mem://` backend.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use governance_state::fakes::{FaultInjectingAuditStore, MemoryAuditStore};
use governance_state::storage_traits::*;
use governance_state::{StorageError, SurrealAuditStore};

fn entry_at(seq: u64, timestamp: DateTime<Utc>, principal: &str, action: &str) -> AuditLogEntry {
    AuditLogEntry {
        id: format!("entry-{seq}"),
        sequence: seq,
        timestamp,
        principal_id: principal.to_string(),
        action: action.to_string(),
        resource: "policies".to_string(),
        resource_id: format!("pol-{}", seq % 2),
        result: "allowed".to_string(),
        metadata: serde_json::json!({ "seq": seq }),
        previous_hash: "0".repeat(64),
        hash: format!("{:064x}", seq + 1),
    }
}

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

async fn seed(store: &dyn AuditStore) {
    let t0 = base_time();
    let actions = ["PERMISSION_GRANTED", "PERMISSION_DENIED", "DECISION_RECORDED"];
    for seq in 0..6u64 {
        let principal = if seq % 2 == 0 { "alice" } else { "bob" };
        let e = entry_at(
            seq,
            t0 + Duration::minutes(seq as i64),
            principal,
            actions[(seq % 3) as usize],
        );
        store.append(&e).await.unwrap();
    }
}

async fn contract_append_and_get(store: &dyn AuditStore) {
    seed(store).await;
    let got = store.get(3).await.unwrap().expect("entry 3");
    assert_eq!(got.sequence, 3);
    assert_eq!(got.id, "entry-3");
    assert_eq!(got.principal_id, "bob");
    assert_eq!(got.metadata, serde_json::json!({ "seq": 3 }));
    assert!(store.get(42).await.unwrap().is_none());

    let by_id = store.get_by_id("entry-4").await.unwrap().expect("entry-4");
    assert_eq!(by_id.sequence, 4);
    assert!(store.get_by_id("entry-42").await.unwrap().is_none());
}

async fn contract_duplicate_sequence_rejected(store: &dyn AuditStore) {
    let e = entry_at(0, base_time(), "alice", "PERMISSION_GRANTED");
    store.append(&e).await.unwrap();
    let err = store.append(&e).await.unwrap_err();
    assert_eq!(err, StorageError::SequenceConflict { sequence: 0 });
}

async fn contract_head_is_highest_sequence(store: &dyn AuditStore) {
    assert!(store.head().await.unwrap().is_none());
    seed(store).await;
    assert_eq!(store.head().await.unwrap().unwrap().sequence, 5);
}

async fn contract_query_is_ordered_and_filtered(store: &dyn AuditStore) {
    seed(store).await;

    let all = store.query(&AuditQuery::all()).await.unwrap();
    let seqs: Vec<u64> = all.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);

    let alice = store
        .query(&AuditQuery::all().with_principal("alice"))
        .await
        .unwrap();
    assert_eq!(
        alice.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![0, 2, 4]
    );

    let t0 = base_time();
    let window = store
        .query(&AuditQuery::between(
            t0 + Duration::minutes(1),
            t0 + Duration::minutes(3),
        ))
        .await
        .unwrap();
    assert_eq!(
        window.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let page = store
        .query(&AuditQuery::all().with_offset(2).with_limit(2))
        .await
        .unwrap();
    assert_eq!(
        page.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![2, 3]
    );
}

async fn contract_archive_flags_but_keeps(store: &dyn AuditStore) {
    seed(store).await;
    let cutoff = base_time() + Duration::minutes(2);
    assert_eq!(store.archive_before(cutoff).await.unwrap(), 2);
    // second pass is a no-op
    assert_eq!(store.archive_before(cutoff).await.unwrap(), 0);

    let live = store
        .query(&AuditQuery::all().excluding_archived())
        .await
        .unwrap();
    assert_eq!(live.first().map(|e| e.sequence), Some(2));

    let everything = store.query(&AuditQuery::all()).await.unwrap();
    assert_eq!(everything.len(), 6);
    assert!(store.get(0).await.unwrap().is_some());
}

// ===========================================================================
// MemoryAuditStore
// ===========================================================================

#[tokio::test]
async fn memory_append_and_get() {
    contract_append_and_get(&MemoryAuditStore::new()).await;
}

#[tokio::test]
async fn memory_duplicate_sequence_rejected() {
    contract_duplicate_sequence_rejected(&MemoryAuditStore::new()).await;
}

#[tokio::test]
async fn memory_head_is_highest_sequence() {
    contract_head_is_highest_sequence(&MemoryAuditStore::new()).await;
}

#[tokio::test]
async fn memory_query_is_ordered_and_filtered() {
    contract_query_is_ordered_and_filtered(&MemoryAuditStore::new()).await;
}

#[tokio::test]
async fn memory_archive_flags_but_keeps() {
    contract_archive_flags_but_keeps(&MemoryAuditStore::new()).await;
}

#[tokio::test]
async fn memory_overwrite_entry_bypasses_checks() {
    let store = MemoryAuditStore::new();
    seed(&store).await;
    let mut tampered = store.get(1).await.unwrap().unwrap();
    tampered.result = "denied".to_string();
    store.overwrite_entry(tampered);
    assert_eq!(store.get(1).await.unwrap().unwrap().result, "denied");
    assert_eq!(store.len(), 6);

    assert!(store.remove_entry(1).is_some());
    assert!(store.get(1).await.unwrap().is_none());
}

// ===========================================================================
// FaultInjectingAuditStore
// ===========================================================================

#[tokio::test]
async fn fault_injection_fails_exactly_n_appends() {
    let inner = Arc::new(MemoryAuditStore::new());
    let store = FaultInjectingAuditStore::new(inner.clone());
    store.fail_next(2);

    let e0 = entry_at(0, base_time(), "alice", "X");
    assert!(matches!(
        store.append(&e0).await,
        Err(StorageError::Unavailable(_))
    ));
    assert!(store.append(&e0).await.is_err());
    store.append(&e0).await.unwrap();

    assert_eq!(store.failed_appends(), 2);
    assert_eq!(inner.len(), 1);
}

// ===========================================================================
// SurrealAuditStore (mem://)
// ===========================================================================

#[tokio::test]
async fn surreal_append_and_get() {
    let store = SurrealAuditStore::in_memory().await.unwrap();
    contract_append_and_get(&store).await;
}

#[tokio::test]
async fn surreal_duplicate_sequence_rejected() {
    let store = SurrealAuditStore::in_memory().await.unwrap();
    contract_duplicate_sequence_rejected(&store).await;
}

#[tokio::test]
async fn surreal_head_is_highest_sequence() {
    let store = SurrealAuditStore::in_memory().await.unwrap();
    contract_head_is_highest_sequence(&store).await;
}

#[tokio::test]
async fn surreal_query_is_ordered_and_filtered() {
    let store = SurrealAuditStore::in_memory().await.unwrap();
    contract_query_is_ordered_and_filtered(&store).await;
}

#[tokio::test]
async fn surreal_archive_flags_but_keeps() {
    let store = SurrealAuditStore::in_memory().await.unwrap();
    contract_archive_flags_but_keeps(&store).await;
}
