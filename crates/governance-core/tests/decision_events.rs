//! Canonical hashing and decision event validation through the public API.

use governance_core::{
    codes, compute_digest, default_confidence, hash, validate_decision_event, DecisionDraft,
    DecisionType, GovernanceError, ViolationCode,
};
use serde_json::json;

fn valid_raw() -> serde_json::Value {
    DecisionDraft::new("policy-agent", "2.0.1", DecisionType::PolicyAdherence, "exec-7")
        .inputs(json!({"policies": ["p-1", "p-2"], "window_days": 30}))
        .outputs(json!({"adherence_rate": 0.97}))
        .confidence(default_confidence(0.95, 0.9))
        .policy_scope(vec!["security".to_string()])
        .org_boundaries(vec!["org-1".to_string()])
        .build_raw()
        .unwrap()
}

#[test]
fn test_hash_ignores_key_order() {
    let a = json!({"b": 2, "a": {"y": [1, 2], "x": null}});
    let b = json!({"a": {"x": null, "y": [1, 2]}, "b": 2});
    assert_eq!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    assert_ne!(
        compute_digest(&json!([1, 2])).unwrap(),
        compute_digest(&json!([2, 1])).unwrap()
    );
}

#[test]
fn test_typed_hash_matches_value_hash() {
    #[derive(serde::Serialize)]
    struct Inputs {
        window_days: u32,
        policies: Vec<&'static str>,
    }
    let typed = Inputs {
        window_days: 30,
        policies: vec!["p-1"],
    };
    assert_eq!(
        hash(&typed).unwrap(),
        compute_digest(&json!({"policies": ["p-1"], "window_days": 30})).unwrap()
    );
}

#[test]
fn test_draft_sets_inputs_hash() {
    let raw = valid_raw();
    let expected = compute_digest(&json!({"window_days": 30, "policies": ["p-1", "p-2"]})).unwrap();
    assert_eq!(raw["inputs_hash"], expected.as_str());

    let event = validate_decision_event(&raw).unwrap();
    assert_eq!(event.inputs_hash(), expected);
    assert_eq!(event.organization_id(), Some("org-1"));
}

#[test]
fn test_confidence_scores_in_range_are_valid() {
    let mut raw = valid_raw();
    raw["confidence"] = json!({"coverage": 0.95, "completeness": 0.9, "overall": 0.93});
    let event = validate_decision_event(&raw).unwrap();
    assert_eq!(event.confidence().overall, 0.93);
}

#[test]
fn test_coverage_out_of_range_rejected() {
    let mut raw = valid_raw();
    raw["confidence"]["coverage"] = json!(1.5);
    let err = validate_decision_event(&raw).unwrap_err();
    assert_eq!(err.code(), codes::VALIDATION_CONSTRAINT_VIOLATION);
    assert_eq!(
        err.for_path("confidence.coverage").unwrap().code,
        ViolationCode::ConstraintViolation
    );

    let wrapped: GovernanceError = err.into();
    assert_eq!(wrapped.code(), codes::VALIDATION_CONSTRAINT_VIOLATION);
}

#[test]
fn test_every_violation_reported() {
    let mut raw = valid_raw();
    raw["agent_version"] = json!("v2");
    raw["confidence"]["overall"] = json!(-0.1);
    raw["constraints_applied"]["policy_scope"] = json!(["ok", 3]);
    raw.as_object_mut().unwrap().remove("execution_ref");

    let err = validate_decision_event(&raw).unwrap_err();
    let paths = err.paths();
    assert!(paths.contains(&"agent_version"), "{err}");
    assert!(paths.contains(&"confidence.overall"), "{err}");
    assert!(paths.contains(&"constraints_applied.policy_scope[1]"), "{err}");
    assert!(paths.contains(&"execution_ref"), "{err}");
    assert!(err.has(ViolationCode::MissingRequired));
    assert!(err.has(ViolationCode::InvalidInput));
}

#[test]
fn test_unsupported_schema_major_rejected() {
    let mut raw = valid_raw();
    raw["schema_version"] = json!("2.0");
    let err = validate_decision_event(&raw).unwrap_err();
    assert!(err.has(ViolationCode::SchemaVersionMismatch));
}

#[test]
fn test_validated_event_serializes_back() {
    let event = validate_decision_event(&valid_raw()).unwrap();
    let round = validate_decision_event(&event.to_value()).unwrap();
    assert_eq!(round.digest().unwrap(), event.digest().unwrap());
    assert_eq!(event.to_value()["decision_type"], "policy_adherence");
}
