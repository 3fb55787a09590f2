//! Execution span tracking.
//!
//! Spans prove that an agent actually ran and what it produced. A repo span
//! that closes without any agent span is recorded as a failure with
//! `NO_AGENT_EVIDENCE`; callers cannot opt out of that rule.

pub mod error;
pub mod model;

pub use error::SpanViolation;
pub use model::{
    AgentSpan, RepoSpan, SpanArtifact, SpanError, SpanStatus, DECISION_EVENT_ARTIFACT,
};
