//! Error taxonomy for the governance engine.

use serde::{Deserialize, Serialize};

/// Stable error codes surfaced to callers and written into span errors.
pub mod codes {
    pub const VALIDATION_INVALID_INPUT: &str = "VALIDATION_INVALID_INPUT";
    pub const VALIDATION_MISSING_REQUIRED: &str = "VALIDATION_MISSING_REQUIRED";
    pub const VALIDATION_TYPE_MISMATCH: &str = "VALIDATION_TYPE_MISMATCH";
    pub const VALIDATION_CONSTRAINT_VIOLATION: &str = "VALIDATION_CONSTRAINT_VIOLATION";
    pub const VALIDATION_SCHEMA_VERSION_MISMATCH: &str = "VALIDATION_SCHEMA_VERSION_MISMATCH";
    pub const NO_AGENT_EVIDENCE: &str = "NO_AGENT_EVIDENCE";
    pub const CHAIN_INTEGRITY_VIOLATION: &str = "CHAIN_INTEGRITY_VIOLATION";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const SPAN_TERMINAL_STATE: &str = "SPAN_TERMINAL_STATE";
    pub const SPAN_PARENT_MISMATCH: &str = "SPAN_PARENT_MISMATCH";
    pub const AUDIT_APPEND_FAILED: &str = "AUDIT_APPEND_FAILED";
    pub const AUDIT_UNAVAILABLE: &str = "AUDIT_UNAVAILABLE";
    pub const POLICY_CONFIGURATION: &str = "POLICY_CONFIGURATION";
    pub const CONFIGURATION_INVALID: &str = "CONFIGURATION_INVALID";
    pub const CANCELLED: &str = "CANCELLED";
}

/// Category of a single failed field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    InvalidInput,
    MissingRequired,
    TypeMismatch,
    ConstraintViolation,
    SchemaVersionMismatch,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::InvalidInput => codes::VALIDATION_INVALID_INPUT,
            ViolationCode::MissingRequired => codes::VALIDATION_MISSING_REQUIRED,
            ViolationCode::TypeMismatch => codes::VALIDATION_TYPE_MISMATCH,
            ViolationCode::ConstraintViolation => codes::VALIDATION_CONSTRAINT_VIOLATION,
            ViolationCode::SchemaVersionMismatch => codes::VALIDATION_SCHEMA_VERSION_MISMATCH,
        }
    }
}

impl std::fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check, addressed by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub code: ViolationCode,
    pub message: String,
}

/// Every violation found in a payload. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{} field violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} [{}] {}", v.path, v.code, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Code of the first violation.
    pub fn code(&self) -> &'static str {
        self.violations
            .first()
            .map(|v| v.code.as_str())
            .unwrap_or(codes::VALIDATION_INVALID_INPUT)
    }

    /// Whether any violation carries `code`.
    pub fn has(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }

    /// Violated field paths, in discovery order.
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }

    /// Violation for a given path, if any.
    pub fn for_path(&self, path: &str) -> Option<&FieldViolation> {
        self.violations.iter().find(|v| v.path == path)
    }
}

/// Top-level error for the governance engine.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    #[error("decision event rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("span violation: {0}")]
    Span(#[from] crate::spans::SpanViolation),

    #[error("audit error: {0}")]
    Audit(#[from] crate::audit::AuditError),

    #[error("permission error: {0}")]
    Permission(#[from] crate::permissions::PermissionError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl GovernanceError {
    /// Stable taxonomy code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GovernanceError::Validation(e) => e.code(),
            GovernanceError::Canonicalization(_) | GovernanceError::Serialization(_) => {
                codes::VALIDATION_INVALID_INPUT
            }
            GovernanceError::Span(e) => e.code(),
            GovernanceError::Audit(e) => e.code(),
            GovernanceError::Permission(e) => e.code(),
            GovernanceError::Config(_) => codes::CONFIGURATION_INVALID,
        }
    }
}

/// Result type for governance domain operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;
