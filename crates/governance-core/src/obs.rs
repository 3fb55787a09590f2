//! Structured observability hooks for governance events.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! Integrity violations, missing agent evidence and audit failures are
//! emitted at `warn!`/`error!`; routine lifecycle events at `info!`/`debug!`.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::audit::IntegrityViolation;
use crate::permissions::ReasonCode;
use crate::spans::SpanStatus;

/// RAII guard that tags all tracing calls with an execution id while held.
///
/// ```ignore
/// let _guard = ExecutionSpanGuard::enter("exec-42");
/// ```
pub struct ExecutionSpanGuard {
    _span: tracing::span::EnteredSpan,
}

impl ExecutionSpanGuard {
    pub fn enter(execution_id: &str) -> Self {
        Self {
            _span: execution_span(execution_id).entered(),
        }
    }
}

/// Execution-scoped span for async work; attach with
/// [`tracing::Instrument::instrument`] rather than holding a guard across
/// `.await`.
pub fn execution_span(execution_id: &str) -> tracing::Span {
    tracing::info_span!("governance.execution", execution_id = %execution_id)
}

pub fn emit_span_opened(kind: &str, span_id: &str, parent_span_id: Option<&str>, execution_id: &str) {
    debug!(
        event = "span.opened",
        kind = %kind,
        span_id = %span_id,
        parent_span_id = parent_span_id.unwrap_or(""),
        execution_id = %execution_id,
    );
}

pub fn emit_span_closed(span_id: &str, status: SpanStatus, error_code: Option<&str>) {
    info!(
        event = "span.closed",
        span_id = %span_id,
        status = %status,
        error_code = error_code.unwrap_or(""),
    );
}

/// Repository span closed without any agent span underneath it.
pub fn emit_evidence_missing(execution_id: &str, span_id: &str) {
    warn!(
        event = "span.evidence_missing",
        execution_id = %execution_id,
        span_id = %span_id,
    );
}

pub fn emit_decision_validated(decision_id: &str, decision_type: &str, agent_id: &str) {
    info!(
        event = "decision.validated",
        decision_id = %decision_id,
        decision_type = %decision_type,
        agent_id = %agent_id,
    );
}

pub fn emit_decision_rejected(violation_count: usize, first_code: &str) {
    warn!(
        event = "decision.rejected",
        violations = violation_count,
        code = %first_code,
    );
}

pub fn emit_audit_appended(sequence: u64, action: &str, principal_id: &str) {
    debug!(
        event = "audit.appended",
        sequence = sequence,
        action = %action,
        principal_id = %principal_id,
    );
}

/// Queued append could not be used; writing synchronously instead.
pub fn emit_audit_fallback(action: &str, reason: &str) {
    warn!(event = "audit.fallback", action = %action, reason = %reason);
}

pub fn emit_audit_append_failed(action: &str, error: &dyn std::fmt::Display) {
    error!(event = "audit.append_failed", action = %action, error = %error);
}

pub fn emit_integrity_violation(violation: &IntegrityViolation) {
    error!(
        event = "audit.integrity_violation",
        kind = violation.kind(),
        sequence = violation.sequence(),
        code = violation.code(),
    );
}

pub fn emit_integrity_verified(entries_checked: u64, violations: usize) {
    info!(
        event = "audit.integrity_verified",
        entries_checked = entries_checked,
        violations = violations,
        verified = violations == 0,
    );
}

pub fn emit_audit_archived(cutoff: DateTime<Utc>, archived: u64) {
    info!(
        event = "audit.archived",
        cutoff = %cutoff.to_rfc3339(),
        archived = archived,
    );
}

pub fn emit_permission_decided(
    principal_id: &str,
    resource_id: &str,
    action: &str,
    allowed: bool,
    reason: ReasonCode,
) {
    info!(
        event = "permission.decided",
        principal_id = %principal_id,
        resource_id = %resource_id,
        action = %action,
        allowed = allowed,
        reason = %reason,
    );
}

pub fn emit_permission_cache_hit(principal_id: &str, resource_id: &str, action: &str) {
    debug!(
        event = "permission.cache_hit",
        principal_id = %principal_id,
        resource_id = %resource_id,
        action = %action,
    );
}
