//! Errors for illegal span transitions.

use crate::domain::error::codes;

use super::model::SpanStatus;

/// A span operation that would break the lifecycle or hierarchy rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanViolation {
    #[error("span {span_id} is already {status} and cannot change")]
    TerminalState { span_id: String, status: SpanStatus },

    #[error("span {span_id} can only be closed as COMPLETED or FAILED")]
    InvalidCloseStatus { span_id: String },

    #[error("agent span {span_id} must be closed before it is recorded")]
    AgentStillRunning { span_id: String },

    #[error("agent span parent {found} does not match repo span {expected}")]
    ParentMismatch { expected: String, found: String },

    #[error("repo span for execution {execution_id} carries no agent spans")]
    NoAgentEvidence { execution_id: String },
}

impl SpanViolation {
    pub fn code(&self) -> &'static str {
        match self {
            SpanViolation::TerminalState { .. }
            | SpanViolation::InvalidCloseStatus { .. }
            | SpanViolation::AgentStillRunning { .. } => codes::SPAN_TERMINAL_STATE,
            SpanViolation::ParentMismatch { .. } => codes::SPAN_PARENT_MISMATCH,
            SpanViolation::NoAgentEvidence { .. } => codes::NO_AGENT_EVIDENCE,
        }
    }
}
