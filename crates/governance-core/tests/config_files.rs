//! Engine configuration and policy files on disk.

use std::io::Write;

use governance_core::{AccessPolicy, ConfigError, GovernanceConfig, PolicySource};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[audit]\nqueue_capacity = 64\n\n[permissions]\ncache_ttl_secs = 15\nmax_hierarchy_depth = 8"
    )
    .unwrap();

    let config = GovernanceConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.audit.queue_capacity, 64);
    assert_eq!(config.permissions.cache_ttl_secs, 15);
    assert_eq!(config.permissions.max_hierarchy_depth, 8);
    assert_eq!(config.permissions.cache_max_entries, 10_000);
}

#[test]
fn test_malformed_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[audit\nqueue_capacity = ").unwrap();
    let err = GovernanceConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn test_policy_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    let policy = AccessPolicy::standard_org_roles();
    std::fs::write(&path, serde_json::to_string_pretty(&policy).unwrap()).unwrap();

    let loaded = AccessPolicy::from_json_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, policy);
    let admin = loaded.role("admin").await.unwrap().unwrap();
    assert_eq!(admin.level, 80);
}
