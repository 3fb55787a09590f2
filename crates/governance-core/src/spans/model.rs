//! Execution spans: Core → Repo → Agent.
//!
//! A [`RepoSpan`] covers one handler invocation and owns the ordered
//! [`AgentSpan`]s that ran inside it. Each agent span carries the
//! [`SpanArtifact`]s it produced. Both kinds move `RUNNING → COMPLETED`
//! or `RUNNING → FAILED` exactly once; any further transition is refused
//! and leaves the span as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::decision::DecisionEvent;
use crate::domain::error::codes;
use crate::obs;

use super::error::SpanViolation;

/// Artifact type used for decision event evidence.
pub const DECISION_EVENT_ARTIFACT: &str = "decision_event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatus {
    Running,
    Completed,
    Failed,
}

impl SpanStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpanStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Running => "RUNNING",
            SpanStatus::Completed => "COMPLETED",
            SpanStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a failed span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SpanError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Machine-verifiable evidence produced by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanArtifact {
    pub artifact_id: String,
    pub artifact_type: String,
    pub data: serde_json::Value,
}

impl SpanArtifact {
    pub fn new(artifact_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            artifact_id: uuid::Uuid::new_v4().to_string(),
            artifact_type: artifact_type.into(),
            data,
        }
    }

    /// Wrap a validated decision event; the artifact id is the event id.
    pub fn decision_event(event: &DecisionEvent) -> Self {
        Self {
            artifact_id: event.id().to_string(),
            artifact_type: DECISION_EVENT_ARTIFACT.to_string(),
            data: event.to_value(),
        }
    }
}

/// Lifecycle fields shared by every span kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SpanState {
    span_id: String,
    #[serde(default)]
    parent_span_id: Option<String>,
    status: SpanStatus,
    start_time: DateTime<Utc>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<SpanError>,
}

impl SpanState {
    fn open(parent_span_id: Option<String>) -> Self {
        Self {
            span_id: uuid::Uuid::new_v4().to_string(),
            parent_span_id,
            status: SpanStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            error: None,
        }
    }

    fn ensure_running(&self) -> Result<(), SpanViolation> {
        if self.status.is_terminal() {
            return Err(SpanViolation::TerminalState {
                span_id: self.span_id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn finish(
        &mut self,
        status: SpanStatus,
        error: Option<SpanError>,
    ) -> Result<SpanStatus, SpanViolation> {
        self.ensure_running()?;
        if !status.is_terminal() {
            return Err(SpanViolation::InvalidCloseStatus {
                span_id: self.span_id.clone(),
            });
        }
        self.status = status;
        self.error = error;
        self.end_time = Some(Utc::now());
        obs::emit_span_closed(
            &self.span_id,
            status,
            self.error.as_ref().map(|e| e.code.as_str()),
        );
        Ok(status)
    }
}

fn cancelled(reason: &str) -> SpanError {
    SpanError::new(codes::CANCELLED, reason)
}

/// One agent execution inside a repo span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpan {
    #[serde(flatten)]
    state: SpanState,
    agent_name: String,
    #[serde(default)]
    artifacts: Vec<SpanArtifact>,
}

impl AgentSpan {
    pub fn span_id(&self) -> &str {
        &self.state.span_id
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.state.parent_span_id.as_deref()
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn status(&self) -> SpanStatus {
        self.state.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.state.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.end_time
    }

    pub fn error(&self) -> Option<&SpanError> {
        self.state.error.as_ref()
    }

    pub fn artifacts(&self) -> &[SpanArtifact] {
        &self.artifacts
    }

    /// Attach evidence. Only a RUNNING span accepts artifacts.
    pub fn attach_artifact(&mut self, artifact: SpanArtifact) -> Result<(), SpanViolation> {
        self.state.ensure_running()?;
        self.artifacts.push(artifact);
        Ok(())
    }

    /// Move to a terminal status, stamping `end_time`.
    pub fn close(
        &mut self,
        status: SpanStatus,
        error: Option<SpanError>,
    ) -> Result<SpanStatus, SpanViolation> {
        self.state.finish(status, error)
    }

    /// Abort the agent: FAILED with code CANCELLED.
    pub fn cancel(&mut self, reason: &str) -> Result<SpanStatus, SpanViolation> {
        self.state.finish(SpanStatus::Failed, Some(cancelled(reason)))
    }
}

/// One handler invocation and the agent spans it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSpan {
    #[serde(flatten)]
    state: SpanState,
    execution_id: String,
    #[serde(default)]
    agent_spans: Vec<AgentSpan>,
}

impl RepoSpan {
    /// Open a root repo span for `execution_id`.
    pub fn open(execution_id: impl Into<String>) -> Self {
        Self::open_inner(None, execution_id.into())
    }

    /// Open a repo span under a core (request-level) span.
    pub fn open_under(core_span_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self::open_inner(Some(core_span_id.into()), execution_id.into())
    }

    fn open_inner(parent: Option<String>, execution_id: String) -> Self {
        let span = Self {
            state: SpanState::open(parent),
            execution_id,
            agent_spans: Vec::new(),
        };
        obs::emit_span_opened(
            "repo",
            span.span_id(),
            span.parent_span_id(),
            &span.execution_id,
        );
        span
    }

    pub fn span_id(&self) -> &str {
        &self.state.span_id
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.state.parent_span_id.as_deref()
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn status(&self) -> SpanStatus {
        self.state.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.state.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.end_time
    }

    pub fn error(&self) -> Option<&SpanError> {
        self.state.error.as_ref()
    }

    pub fn agent_spans(&self) -> &[AgentSpan] {
        &self.agent_spans
    }

    /// Open an agent span parented to this repo span.
    ///
    /// The agent span is owned by the caller until it is handed back
    /// through [`RepoSpan::record_agent_span`].
    pub fn open_agent_span(&self, agent_name: impl Into<String>) -> Result<AgentSpan, SpanViolation> {
        self.state.ensure_running()?;
        let agent = AgentSpan {
            state: SpanState::open(Some(self.state.span_id.clone())),
            agent_name: agent_name.into(),
            artifacts: Vec::new(),
        };
        obs::emit_span_opened(
            "agent",
            agent.span_id(),
            agent.parent_span_id(),
            &self.execution_id,
        );
        Ok(agent)
    }

    /// Append a finished agent span to this repo span.
    ///
    /// Requires this span to be RUNNING, the agent's parent to be this span
    /// and the agent to be terminal.
    pub fn record_agent_span(&mut self, agent: AgentSpan) -> Result<(), SpanViolation> {
        self.state.ensure_running()?;
        if agent.parent_span_id() != Some(self.span_id()) {
            return Err(SpanViolation::ParentMismatch {
                expected: self.state.span_id.clone(),
                found: agent.parent_span_id().unwrap_or_default().to_string(),
            });
        }
        if !agent.status().is_terminal() {
            return Err(SpanViolation::AgentStillRunning {
                span_id: agent.span_id().to_string(),
            });
        }
        self.agent_spans.push(agent);
        Ok(())
    }

    /// Move to a terminal status.
    ///
    /// A repo span with no agent spans always ends FAILED with
    /// `NO_AGENT_EVIDENCE`, whatever status was requested. Returns the
    /// status actually applied.
    pub fn close(
        &mut self,
        status: SpanStatus,
        error: Option<SpanError>,
    ) -> Result<SpanStatus, SpanViolation> {
        let _guard = obs::ExecutionSpanGuard::enter(&self.execution_id);
        self.state.ensure_running()?;
        if !status.is_terminal() {
            return Err(SpanViolation::InvalidCloseStatus {
                span_id: self.state.span_id.clone(),
            });
        }
        if self.agent_spans.is_empty() {
            obs::emit_evidence_missing(&self.execution_id, &self.state.span_id);
            crate::metrics::METRICS.inc_evidence_missing();
            let details = match error {
                Some(requested) => serde_json::json!({
                    "requested_status": status,
                    "requested_error": requested,
                }),
                None => serde_json::json!({ "requested_status": status }),
            };
            let evidence = SpanError::new(
                codes::NO_AGENT_EVIDENCE,
                "execution finished without any agent span",
            )
            .with_details(details);
            return self.state.finish(SpanStatus::Failed, Some(evidence));
        }
        self.state.finish(status, error)
    }

    /// Abort the execution: FAILED with code CANCELLED (or
    /// `NO_AGENT_EVIDENCE` when no agent span was recorded).
    pub fn cancel(&mut self, reason: &str) -> Result<SpanStatus, SpanViolation> {
        self.close(SpanStatus::Failed, Some(cancelled(reason)))
    }

    /// Number of artifacts across all recorded agent spans.
    pub fn artifact_count(&self) -> usize {
        self.agent_spans.iter().map(|a| a.artifacts.len()).sum()
    }
}
