//! Invocation context handed to governance agents by their caller.

use serde::{Deserialize, Serialize};

/// Identifies the service that triggered an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Context supplied with every agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    /// Reference copied into every decision event the execution emits
    pub execution_ref: String,
    pub organization_id: String,
    pub caller: CallerInfo,
    /// Opaque propagation data (e.g. W3C trace headers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_context: Option<serde_json::Value>,
}

impl AgentContext {
    pub fn new(
        execution_ref: impl Into<String>,
        organization_id: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            execution_ref: execution_ref.into(),
            organization_id: organization_id.into(),
            caller: CallerInfo {
                service: service.into(),
                trace_id: None,
            },
            telemetry_context: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.caller.trace_id = Some(trace_id.into());
        self
    }

    /// Trace id to use as a decision's correlation id, if the caller sent one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.caller.trace_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_deserializes_without_optionals() {
        let ctx: AgentContext = serde_json::from_value(serde_json::json!({
            "execution_ref": "exec-1",
            "organization_id": "org-1",
            "caller": {"service": "dashboard"}
        }))
        .unwrap();
        assert_eq!(ctx, AgentContext::new("exec-1", "org-1", "dashboard"));
        assert!(ctx.correlation_id().is_none());
        assert_eq!(
            ctx.with_trace_id("t-9").correlation_id(),
            Some("t-9")
        );
    }
}
