//! Hash-chained audit log: appends, tamper detection, fallback and exports.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use governance_core::audit::{
    compute_entry_hash, parse_jsonl, verify_entries, Predecessor, CSV_HEADER, GENESIS_HASH,
};
use governance_core::{
    codes, AuditChain, AuditConfig, AuditError, AuditFields, AuditQuery, ExportFormat,
    IntegrityViolation,
};
use governance_state::fakes::{FaultInjectingAuditStore, MemoryAuditStore};

fn fields(principal: &str, resource_id: &str) -> AuditFields {
    AuditFields::new(principal, "DECISION_RECORDED", "decision_event", resource_id, "recorded")
        .with_metadata(serde_json::json!({ "decision_type": "audit_summary" }))
}

async fn chain_with(store: Arc<MemoryAuditStore>) -> AuditChain {
    AuditChain::open(store, &AuditConfig::default()).await.unwrap()
}

#[tokio::test]
async fn test_entries_link_to_predecessor() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store).await;

    let a = chain.append(fields("u1", "d-a")).await.unwrap();
    let b = chain.append(fields("u1", "d-b")).await.unwrap();
    let c = chain.append(fields("u2", "d-c")).await.unwrap();

    assert_eq!(a.previous_hash, GENESIS_HASH);
    assert_eq!(b.previous_hash, a.hash);
    assert_eq!(c.previous_hash, b.hash);
    assert_eq!((a.sequence, b.sequence, c.sequence), (0, 1, 2));

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert!(report.verified);
    assert_eq!(report.entries_checked, 3);
}

#[tokio::test]
async fn test_tampered_middle_entry_reported_once() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;
    chain.append(fields("u1", "d-a")).await.unwrap();
    let b = chain.append(fields("u1", "d-b")).await.unwrap();
    chain.append(fields("u1", "d-c")).await.unwrap();

    let mut forged = b.clone();
    forged.result = "rejected".to_string();
    store.overwrite_entry(forged);

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert!(!report.verified);
    assert_eq!(report.violations.len(), 1, "{:?}", report.violations);
    match &report.violations[0] {
        IntegrityViolation::HashMismatch {
            sequence, stored, ..
        } => {
            assert_eq!(*sequence, 1);
            assert_eq!(stored, &b.hash);
        }
        other => panic!("expected hash mismatch, got {other:?}"),
    }
    assert_eq!(report.violations[0].code(), codes::CHAIN_INTEGRITY_VIOLATION);
}

#[tokio::test]
async fn test_rewritten_link_is_chain_break() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;
    chain.append(fields("u1", "d-a")).await.unwrap();
    let b = chain.append(fields("u1", "d-b")).await.unwrap();

    // attacker re-hashes b consistently but points it at a forged predecessor
    let mut forged = b.clone();
    forged.previous_hash = "f".repeat(64);
    forged.hash = compute_entry_hash(&forged).unwrap();
    store.overwrite_entry(forged);

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert_eq!(report.violations.len(), 2, "{:?}", report.violations);
    assert!(matches!(
        report.violations[0],
        IntegrityViolation::ChainBreak { sequence: 1, .. }
    ));
    // b is also the tail, which no longer matches the writer's head
    assert_eq!(report.violations[1].kind(), "head_mismatch");

    // bounded ranges skip the head comparison
    let bounded = chain.verify_integrity(None, Some(Utc::now())).await.unwrap();
    assert_eq!(bounded.violations.len(), 1);
}

#[tokio::test]
async fn test_deleted_entry_reported_as_missing() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;
    for i in 0..4 {
        chain.append(fields("u1", &format!("d-{i}"))).await.unwrap();
    }
    store.remove_entry(2);

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert!(!report.verified);
    assert!(report.violations.contains(&IntegrityViolation::MissingEntries {
        first_missing: 2,
        last_missing: 2,
    }));
    assert!(report.violations.iter().any(|v| matches!(
        v,
        IntegrityViolation::ChainBreak { sequence: 3, .. }
    )));
}

#[tokio::test]
async fn test_deleted_newest_entries_detected() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;
    for i in 0..4 {
        chain.append(fields("u1", &format!("d-{i}"))).await.unwrap();
    }
    store.remove_entry(3);
    store.remove_entry(2);

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert!(!report.verified);
    assert_eq!(
        report.violations,
        vec![IntegrityViolation::MissingEntries {
            first_missing: 2,
            last_missing: 3,
        }]
    );
    assert_eq!(chain.next_sequence().await, 4);
}

#[tokio::test]
async fn test_rehashed_newest_entry_detected() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;
    chain.append(fields("u1", "d-a")).await.unwrap();
    let b = chain.append(fields("u1", "d-b")).await.unwrap();

    // content and hash rewritten consistently, link to a left intact
    let mut forged = b.clone();
    forged.result = "rejected".to_string();
    forged.hash = compute_entry_hash(&forged).unwrap();
    store.overwrite_entry(forged.clone());

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert_eq!(
        report.violations,
        vec![IntegrityViolation::HeadMismatch {
            sequence: 1,
            entry_id: b.id.clone(),
            expected: b.hash.clone(),
            found: forged.hash,
        }]
    );
}

#[tokio::test]
async fn test_single_entry_lookup_and_verify() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;
    let a = chain.append(fields("u1", "d-a")).await.unwrap();
    let b = chain.append(fields("u1", "d-b")).await.unwrap();

    assert_eq!(chain.get(&b.id).await.unwrap(), Some(b.clone()));
    assert!(chain.get("no-such-entry").await.unwrap().is_none());
    assert!(chain.verify_entry("no-such-entry").await.unwrap().is_none());

    let ok = chain.verify_entry(&a.id).await.unwrap().unwrap();
    assert!(ok.verified);
    assert_eq!(ok.entries_checked, 1);

    let mut forged = b.clone();
    forged.principal_id = "u9".to_string();
    store.overwrite_entry(forged);
    let bad = chain.verify_entry(&b.id).await.unwrap().unwrap();
    assert!(!bad.verified);
    assert_eq!(bad.violations[0].kind(), "hash_mismatch");

    store.remove_entry(0);
    let orphan = chain.verify_entry(&b.id).await.unwrap().unwrap();
    assert!(orphan.violations.contains(&IntegrityViolation::MissingEntries {
        first_missing: 0,
        last_missing: 0,
    }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_are_serialized() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store.clone()).await;

    let tasks = (0..64).map(|i| {
        let chain = chain.clone();
        async move { chain.append(fields(&format!("u{}", i % 5), &format!("d-{i}"))).await }
    });
    let results = join_all(tasks).await;

    let mut sequences: Vec<u64> = results.into_iter().map(|r| r.unwrap().sequence).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (0..64).collect::<Vec<_>>());
    assert_eq!(store.len(), 64);
    assert!(chain.verify_integrity(None, None).await.unwrap().verified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saturated_queue_never_drops_entries() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = AuditChain::open(store.clone(), &AuditConfig { queue_capacity: 1 })
        .await
        .unwrap();

    let tasks = (0..40).map(|i| {
        let chain = chain.clone();
        async move { chain.append(fields("u1", &format!("d-{i}"))).await }
    });
    for r in join_all(tasks).await {
        r.unwrap();
    }

    assert_eq!(store.len(), 40);
    assert_eq!(chain.next_sequence().await, 40);
    assert!(chain.verify_integrity(None, None).await.unwrap().verified);
}

#[tokio::test]
async fn test_failed_queued_write_falls_back() {
    let inner = Arc::new(MemoryAuditStore::new());
    let store = Arc::new(FaultInjectingAuditStore::new(inner.clone()));
    let chain = AuditChain::open(store.clone(), &AuditConfig::default())
        .await
        .unwrap();

    store.fail_next(1);
    let entry = chain.append(fields("u1", "d-a")).await.unwrap();

    assert_eq!(store.failed_appends(), 1);
    assert_eq!(entry.sequence, 0);
    assert_eq!(inner.len(), 1);
    assert!(chain.verify_integrity(None, None).await.unwrap().verified);
}

#[tokio::test]
async fn test_failed_fallback_is_fatal_and_keeps_head() {
    let store = Arc::new(FaultInjectingAuditStore::new(Arc::new(MemoryAuditStore::new())));
    let chain = AuditChain::open(store.clone(), &AuditConfig::default())
        .await
        .unwrap();

    store.fail_next(2);
    let err = chain.append(fields("u1", "d-a")).await.unwrap_err();
    assert!(matches!(err, AuditError::AppendFailed { .. }));
    assert!(err.is_fatal());
    assert_eq!(err.code(), codes::AUDIT_APPEND_FAILED);

    let next = chain.append(fields("u1", "d-b")).await.unwrap();
    assert_eq!(next.sequence, 0);
    assert_eq!(next.previous_hash, GENESIS_HASH);
}

#[tokio::test]
async fn test_archived_entries_still_verify() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store).await;
    chain.append(fields("u1", "d-a")).await.unwrap();
    chain.append(fields("u2", "d-b")).await.unwrap();

    let archived = chain
        .archive_before(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(archived, 2);

    let live = chain.query(&AuditQuery::all().excluding_archived()).await.unwrap();
    assert!(live.is_empty());

    let report = chain.verify_integrity(None, None).await.unwrap();
    assert!(report.verified);
    assert_eq!(report.entries_checked, 2);
}

#[tokio::test]
async fn test_range_verification_starts_mid_chain() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store).await;
    chain.append(fields("u1", "d-a")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let b = chain.append(fields("u1", "d-b")).await.unwrap();
    chain.append(fields("u1", "d-c")).await.unwrap();

    let report = chain
        .verify_integrity(Some(b.timestamp), None)
        .await
        .unwrap();
    assert!(report.verified, "{:?}", report.violations);
    assert_eq!(report.entries_checked, 2);
    assert_eq!(report.from, Some(b.timestamp));

    let in_range = chain.range(b.timestamp, Utc::now()).await.unwrap();
    assert_eq!(in_range.first().map(|e| e.sequence), Some(1));
}

#[tokio::test]
async fn test_exports_and_report() {
    let store = Arc::new(MemoryAuditStore::new());
    let chain = chain_with(store).await;
    chain.append(fields("u1", "d-a")).await.unwrap();
    chain
        .append(AuditFields::new("u2", "PERMISSION_DENIED", "policies", "p-1", "denied"))
        .await
        .unwrap();
    chain
        .append(AuditFields::new("u2", "PERMISSION_GRANTED", "policies", "p-1", "allowed"))
        .await
        .unwrap();

    let csv = chain.export(&AuditQuery::all(), ExportFormat::Csv).await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 4);

    let jsonl = chain
        .export(&AuditQuery::all(), ExportFormat::Jsonl)
        .await
        .unwrap();
    let parsed = parse_jsonl(&jsonl).unwrap();
    assert_eq!(parsed.len(), 3);
    assert!(verify_entries(&parsed, Predecessor::Genesis).verified);

    let report = chain.compliance_report(None, None).await.unwrap();
    assert_eq!(report.total_entries, 3);
    assert_eq!(report.unique_principals, 2);
    assert_eq!(report.actions_by_type.get("PERMISSION_DENIED"), Some(&1));
    assert_eq!(report.results_by_type.get("allowed"), Some(&1));

    let by_principal = chain
        .query(&AuditQuery::all().with_principal("u2").with_limit(1))
        .await
        .unwrap();
    assert_eq!(by_principal.len(), 1);
    assert_eq!(by_principal[0].sequence, 1);
}
