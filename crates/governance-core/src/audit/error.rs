//! Audit chain errors.

use governance_state::StorageError;

use crate::domain::error::codes;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuditError {
    /// Reading from or writing to the store failed
    #[error("audit store error: {0}")]
    Storage(#[from] StorageError),

    /// Both the queued write and the synchronous fallback failed; the
    /// governing execution must abort
    #[error("audit append failed after synchronous fallback: {reason}")]
    AppendFailed { reason: String },

    #[error("audit entry could not be hashed: {0}")]
    Hashing(String),

    #[error("audit export failed: {0}")]
    Export(String),
}

impl AuditError {
    pub fn code(&self) -> &'static str {
        match self {
            AuditError::AppendFailed { .. } | AuditError::Hashing(_) => codes::AUDIT_APPEND_FAILED,
            AuditError::Storage(_) | AuditError::Export(_) => codes::AUDIT_UNAVAILABLE,
        }
    }

    /// Whether the failure must abort the execution that triggered it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::AppendFailed { .. })
    }
}
