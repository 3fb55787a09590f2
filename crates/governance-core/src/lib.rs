//! Governance Decision & Audit Integrity Engine
//!
//! Re-exports the engine components: decision validation, execution spans,
//! the hash-chained audit log and the permission evaluator.

pub mod audit;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod metrics;
pub mod obs;
pub mod permissions;
pub mod recording;
pub mod spans;
pub mod telemetry;

pub use domain::{
    codes, default_confidence, validate_decision_event, AgentContext, CallerInfo, Confidence,
    ConfidenceBand, ConstraintsApplied, DecisionDraft, DecisionEvent, DecisionType,
    FieldViolation, GovernanceError, Result, TimeWindow, ValidationError, ViolationCode,
    DECISION_SCHEMA_VERSION,
};

pub use domain::digest::{canonical_json, compute_digest, hash};

pub use spans::{AgentSpan, RepoSpan, SpanArtifact, SpanError, SpanStatus, SpanViolation};

pub use audit::{
    AuditChain, AuditError, AuditFields, ComplianceReport, ExportFormat, IntegrityReport,
    IntegrityViolation,
};

pub use permissions::{
    AccessPolicy, Permission, PermissionDecision, PermissionError, PermissionEvaluator,
    PolicySource, Principal, ReasonCode, Resource, Role, RoleCondition, ScopedPermission,
};

pub use config::{AuditConfig, ConfigError, GovernanceConfig, PermissionConfig};
pub use envelope::ResponseEnvelope;
pub use recording::DecisionRecorder;

pub use governance_state::{AuditLogEntry, AuditQuery, AuditStore, StorageError};
