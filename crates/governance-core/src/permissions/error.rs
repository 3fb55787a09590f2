//! Permission evaluation errors.
//!
//! A denial is a normal [`PermissionDecision`](super::PermissionDecision);
//! [`PermissionError::Denied`] only comes out of
//! [`PermissionEvaluator::require`](super::PermissionEvaluator::require).

use crate::audit::AuditError;
use crate::domain::error::codes;

use super::model::ReasonCode;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PermissionError {
    #[error("invalid permission '{0}': expected 'resource:action'")]
    InvalidPermission(String),

    #[error("policy configuration error: {0}")]
    Configuration(String),

    #[error("policy source error: {0}")]
    Source(String),

    #[error("{principal_id} may not {action} {resource_id} ({reason})")]
    Denied {
        principal_id: String,
        resource_id: String,
        action: String,
        reason: ReasonCode,
    },

    #[error("permission decision could not be audited: {0}")]
    Audit(#[from] AuditError),
}

impl PermissionError {
    pub fn code(&self) -> &'static str {
        match self {
            PermissionError::InvalidPermission(_)
            | PermissionError::Configuration(_)
            | PermissionError::Source(_) => codes::POLICY_CONFIGURATION,
            PermissionError::Denied { .. } => codes::PERMISSION_DENIED,
            PermissionError::Audit(e) => e.code(),
        }
    }
}
