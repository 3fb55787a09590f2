//! Response envelope returned to callers of a governed execution.

use serde::Serialize;

use crate::spans::{RepoSpan, SpanStatus, SpanViolation, DECISION_EVENT_ARTIFACT};

/// Outward view of one finished execution.
///
/// Only constructible from a repo span that recorded at least one agent
/// span; an execution without agent evidence never reaches a caller as a
/// response.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub execution_id: String,
    pub status: SpanStatus,
    /// Ids of the decision events attached across all agent spans, in order
    pub decision_ids: Vec<String>,
    pub span: RepoSpan,
}

impl ResponseEnvelope {
    pub fn from_repo_span(span: RepoSpan) -> Result<Self, SpanViolation> {
        if span.agent_spans().is_empty() {
            return Err(SpanViolation::NoAgentEvidence {
                execution_id: span.execution_id().to_string(),
            });
        }
        let decision_ids = span
            .agent_spans()
            .iter()
            .flat_map(|a| a.artifacts())
            .filter(|artifact| artifact.artifact_type == DECISION_EVENT_ARTIFACT)
            .map(|artifact| artifact.artifact_id.clone())
            .collect();

        Ok(Self {
            execution_id: span.execution_id().to_string(),
            status: span.status(),
            decision_ids,
            span,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == SpanStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::codes;
    use crate::spans::SpanArtifact;

    #[test]
    fn test_empty_repo_span_rejected() {
        let mut repo = RepoSpan::open("exec-1");
        repo.close(SpanStatus::Completed, None).unwrap();
        let err = ResponseEnvelope::from_repo_span(repo).unwrap_err();
        assert_eq!(err.code(), codes::NO_AGENT_EVIDENCE);
    }

    #[test]
    fn test_envelope_lists_decisions() {
        let mut repo = RepoSpan::open("exec-1");
        let mut agent = repo.open_agent_span("a").unwrap();
        agent
            .attach_artifact(SpanArtifact::new("log", serde_json::json!({"line": 1})))
            .unwrap();
        let mut decision = SpanArtifact::new(DECISION_EVENT_ARTIFACT, serde_json::json!({}));
        decision.artifact_id = "dec-1".to_string();
        agent.attach_artifact(decision).unwrap();
        agent.close(SpanStatus::Completed, None).unwrap();
        repo.record_agent_span(agent).unwrap();
        repo.close(SpanStatus::Completed, None).unwrap();

        let envelope = ResponseEnvelope::from_repo_span(repo).unwrap();
        assert!(envelope.is_success());
        assert_eq!(envelope.decision_ids, vec!["dec-1".to_string()]);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["span"]["agent_spans"][0]["agent_name"], "a");
    }
}
