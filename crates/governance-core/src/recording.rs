//! Decision recording: validate, audit, attach as span evidence.
//!
//! The audit entry is written before the decision becomes evidence on the
//! agent span. When the audit chain cannot take the entry the agent span is
//! closed FAILED with `AUDIT_UNAVAILABLE` and the execution must abort.

use serde_json::Value;
use tracing::Instrument;

use crate::audit::{actions, AuditChain, AuditFields};
use crate::domain::error::codes;
use crate::domain::{
    validate_decision_event, AgentContext, DecisionEvent, FieldViolation, GovernanceError,
    ValidationError, ViolationCode,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::spans::{AgentSpan, SpanArtifact, SpanError, SpanStatus, SpanViolation};

/// Audit resource name for decision events.
pub const DECISION_RESOURCE: &str = "decision_event";

/// Records decision events emitted by agents within one execution.
#[derive(Clone)]
pub struct DecisionRecorder {
    audit: AuditChain,
}

impl DecisionRecorder {
    pub fn new(audit: AuditChain) -> Self {
        Self { audit }
    }

    /// Validate `raw`, append `DECISION_RECORDED`, then attach the event to
    /// `agent` as a `decision_event` artifact.
    ///
    /// The event must reference the execution in `ctx`. Validation failures
    /// leave the span untouched.
    pub async fn record(
        &self,
        ctx: &AgentContext,
        agent: &mut AgentSpan,
        raw: &Value,
    ) -> Result<DecisionEvent, GovernanceError> {
        self.record_in_execution(ctx, agent, raw)
            .instrument(obs::execution_span(&ctx.execution_ref))
            .await
    }

    async fn record_in_execution(
        &self,
        ctx: &AgentContext,
        agent: &mut AgentSpan,
        raw: &Value,
    ) -> Result<DecisionEvent, GovernanceError> {
        if agent.status().is_terminal() {
            return Err(SpanViolation::TerminalState {
                span_id: agent.span_id().to_string(),
                status: agent.status(),
            }
            .into());
        }

        let event = match validate_decision_event(raw).and_then(|e| same_execution(ctx, e)) {
            Ok(event) => event,
            Err(err) => {
                obs::emit_decision_rejected(err.violations.len(), err.code());
                METRICS.inc_decisions_rejected();
                return Err(err.into());
            }
        };
        obs::emit_decision_validated(event.id(), event.decision_type().as_str(), event.agent_id());
        METRICS.inc_decisions_validated();

        let fields = AuditFields::new(
            event.agent_id(),
            actions::DECISION_RECORDED,
            DECISION_RESOURCE,
            event.id(),
            "recorded",
        )
        .with_metadata(serde_json::json!({
            "decision_type": event.decision_type(),
            "execution_ref": event.execution_ref(),
            "inputs_hash": event.inputs_hash(),
            "digest": event.digest()?,
            "organization_id": event.organization_id().unwrap_or(ctx.organization_id.as_str()),
            "correlation_id": event.correlation_id().or(ctx.correlation_id()),
            "caller_service": ctx.caller.service,
            "agent_span_id": agent.span_id(),
        }));

        if let Err(err) = self.audit.append(fields).await {
            let span_error = SpanError::new(codes::AUDIT_UNAVAILABLE, err.to_string())
                .with_details(serde_json::json!({ "decision_id": event.id() }));
            agent.close(SpanStatus::Failed, Some(span_error))?;
            return Err(err.into());
        }

        agent.attach_artifact(SpanArtifact::decision_event(&event))?;
        Ok(event)
    }
}

fn same_execution(ctx: &AgentContext, event: DecisionEvent) -> Result<DecisionEvent, ValidationError> {
    if event.execution_ref() == ctx.execution_ref {
        return Ok(event);
    }
    Err(ValidationError {
        violations: vec![FieldViolation {
            path: "execution_ref".to_string(),
            code: ViolationCode::ConstraintViolation,
            message: format!(
                "decision references execution '{}' but was recorded in '{}'",
                event.execution_ref(),
                ctx.execution_ref
            ),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::domain::{default_confidence, DecisionDraft, DecisionType};
    use crate::spans::RepoSpan;
    use governance_state::fakes::{FaultInjectingAuditStore, MemoryAuditStore};
    use std::sync::Arc;

    fn raw(execution_ref: &str) -> Value {
        DecisionDraft::new("compliance-agent", "1.2.0", DecisionType::ComplianceStatus, execution_ref)
            .inputs(serde_json::json!({"controls": ["ac-1", "ac-2"]}))
            .confidence(default_confidence(0.9, 0.8))
            .org_boundaries(vec!["org-1".to_string()])
            .build_raw()
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_attaches_and_audits() {
        let store = Arc::new(MemoryAuditStore::new());
        let chain = AuditChain::open(store, &AuditConfig::default()).await.unwrap();
        let recorder = DecisionRecorder::new(chain.clone());
        let ctx = AgentContext::new("exec-1", "org-1", "governance-api");
        let repo = RepoSpan::open("exec-1");
        let mut agent = repo.open_agent_span("compliance-agent").unwrap();

        let event = recorder.record(&ctx, &mut agent, &raw("exec-1")).await.unwrap();

        assert_eq!(agent.artifacts().len(), 1);
        assert_eq!(agent.artifacts()[0].artifact_id, event.id());
        let entries = chain
            .query(&governance_state::AuditQuery::all())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, actions::DECISION_RECORDED);
        assert_eq!(entries[0].resource_id, event.id());
        assert_eq!(entries[0].metadata["organization_id"], "org-1");
    }

    #[tokio::test]
    async fn test_foreign_execution_ref_rejected() {
        let store = Arc::new(MemoryAuditStore::new());
        let chain = AuditChain::open(store, &AuditConfig::default()).await.unwrap();
        let recorder = DecisionRecorder::new(chain);
        let ctx = AgentContext::new("exec-1", "org-1", "governance-api");
        let mut agent = RepoSpan::open("exec-1").open_agent_span("a").unwrap();

        let err = recorder
            .record(&ctx, &mut agent, &raw("exec-2"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::VALIDATION_CONSTRAINT_VIOLATION);
        assert!(agent.artifacts().is_empty());
        assert_eq!(agent.status(), SpanStatus::Running);
    }

    #[tokio::test]
    async fn test_audit_outage_fails_agent_span() {
        let store = Arc::new(FaultInjectingAuditStore::new(Arc::new(MemoryAuditStore::new())));
        let chain = AuditChain::open(store.clone(), &AuditConfig::default())
            .await
            .unwrap();
        let recorder = DecisionRecorder::new(chain);
        let ctx = AgentContext::new("exec-1", "org-1", "governance-api");
        let mut agent = RepoSpan::open("exec-1").open_agent_span("a").unwrap();

        // queued write and synchronous fallback both fail
        store.fail_next(2);
        let err = recorder
            .record(&ctx, &mut agent, &raw("exec-1"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::AUDIT_APPEND_FAILED);
        assert_eq!(agent.status(), SpanStatus::Failed);
        assert_eq!(
            agent.error().map(|e| e.code.as_str()),
            Some(codes::AUDIT_UNAVAILABLE)
        );
        assert!(agent.artifacts().is_empty());
    }
}
