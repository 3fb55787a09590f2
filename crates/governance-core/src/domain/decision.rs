//! Decision event model.
//!
//! A [`DecisionEvent`] is the verifiable record one governance agent emits
//! per execution. Instances only come out of
//! [`validate_decision_event`](crate::domain::validation::validate_decision_event),
//! so every value in hand has passed schema and semantic checks. The type
//! exposes no mutators.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::digest;
use crate::domain::error::Result;

/// Schema version written by [`DecisionDraft`].
pub const DECISION_SCHEMA_VERSION: &str = "1.0";

/// Kind of governance decision an agent produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    AuditSummary,
    ComplianceStatus,
    GovernanceSnapshot,
    PolicyAdherence,
    ApprovalTrail,
    ChangeImpact,
    RiskAggregation,
}

impl DecisionType {
    pub const ALL: [DecisionType; 7] = [
        DecisionType::AuditSummary,
        DecisionType::ComplianceStatus,
        DecisionType::GovernanceSnapshot,
        DecisionType::PolicyAdherence,
        DecisionType::ApprovalTrail,
        DecisionType::ChangeImpact,
        DecisionType::RiskAggregation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::AuditSummary => "audit_summary",
            DecisionType::ComplianceStatus => "compliance_status",
            DecisionType::GovernanceSnapshot => "governance_snapshot",
            DecisionType::PolicyAdherence => "policy_adherence",
            DecisionType::ApprovalTrail => "approval_trail",
            DecisionType::ChangeImpact => "change_impact",
            DecisionType::RiskAggregation => "risk_aggregation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional uncertainty interval around `overall`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
}

/// Confidence scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub coverage: f64,
    pub completeness: f64,
    pub overall: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_band: Option<ConfidenceBand>,
}

impl Confidence {
    /// Scores with `overall` set to the mean of coverage and completeness.
    pub fn from_scores(coverage: f64, completeness: f64) -> Self {
        Self {
            coverage,
            completeness,
            overall: (coverage + completeness) / 2.0,
            confidence_band: None,
        }
    }

    pub fn with_band(mut self, lower: f64, upper: f64) -> Self {
        self.confidence_band = Some(ConfidenceBand { lower, upper });
        self
    }
}

/// Confidence for agents that only measure coverage and completeness.
pub fn default_confidence(coverage: f64, completeness: f64) -> Confidence {
    Confidence::from_scores(coverage, completeness)
}

/// Inclusive time range a decision covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Constraints an agent operated under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintsApplied {
    pub policy_scope: Vec<String>,
    pub org_boundaries: Vec<String>,
    pub time_window: TimeWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_rules: Option<Vec<String>>,
}

/// Immutable, validated record of one agent decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionEvent {
    pub(crate) id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) schema_version: Option<String>,
    pub(crate) agent_id: String,
    pub(crate) agent_version: String,
    pub(crate) decision_type: DecisionType,
    pub(crate) inputs_hash: String,
    pub(crate) outputs: serde_json::Map<String, serde_json::Value>,
    pub(crate) confidence: Confidence,
    pub(crate) constraints_applied: ConstraintsApplied,
    pub(crate) execution_ref: String,
    pub(crate) timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correlation_id: Option<String>,
}

impl DecisionEvent {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn agent_version(&self) -> &str {
        &self.agent_version
    }

    pub fn decision_type(&self) -> DecisionType {
        self.decision_type
    }

    pub fn inputs_hash(&self) -> &str {
        &self.inputs_hash
    }

    pub fn outputs(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.outputs
    }

    pub fn confidence(&self) -> &Confidence {
        &self.confidence
    }

    pub fn constraints_applied(&self) -> &ConstraintsApplied {
        &self.constraints_applied
    }

    pub fn execution_ref(&self) -> &str {
        &self.execution_ref
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Serialize to a JSON value. Infallible for a validated event.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Content digest of the whole event.
    pub fn digest(&self) -> Result<String> {
        digest::hash(self)
    }
}

/// Builder for raw decision payloads.
///
/// Computes `inputs_hash` from the raw inputs, stamps a fresh id and the
/// current time, and produces the JSON a caller hands to the validator.
#[derive(Debug, Clone)]
pub struct DecisionDraft {
    agent_id: String,
    agent_version: String,
    decision_type: DecisionType,
    inputs: serde_json::Value,
    outputs: serde_json::Value,
    confidence: Confidence,
    policy_scope: Vec<String>,
    org_boundaries: Vec<String>,
    time_window: Option<TimeWindow>,
    compliance_rules: Option<Vec<String>>,
    execution_ref: String,
    organization_id: Option<String>,
    correlation_id: Option<String>,
}

impl DecisionDraft {
    pub fn new(
        agent_id: impl Into<String>,
        agent_version: impl Into<String>,
        decision_type: DecisionType,
        execution_ref: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_version: agent_version.into(),
            decision_type,
            inputs: serde_json::Value::Object(Default::default()),
            outputs: serde_json::Value::Object(Default::default()),
            confidence: default_confidence(1.0, 1.0),
            policy_scope: Vec::new(),
            org_boundaries: Vec::new(),
            time_window: None,
            compliance_rules: None,
            execution_ref: execution_ref.into(),
            organization_id: None,
            correlation_id: None,
        }
    }

    pub fn inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn outputs(mut self, outputs: serde_json::Value) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn policy_scope(mut self, scope: Vec<String>) -> Self {
        self.policy_scope = scope;
        self
    }

    /// Also sets `organization_id` when exactly one boundary is given and
    /// none was set explicitly.
    pub fn org_boundaries(mut self, boundaries: Vec<String>) -> Self {
        if self.organization_id.is_none() && boundaries.len() == 1 {
            self.organization_id = boundaries.first().cloned();
        }
        self.org_boundaries = boundaries;
        self
    }

    pub fn time_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_window = Some(TimeWindow { start, end });
        self
    }

    pub fn compliance_rules(mut self, rules: Vec<String>) -> Self {
        self.compliance_rules = Some(rules);
        self
    }

    pub fn organization_id(mut self, org: impl Into<String>) -> Self {
        self.organization_id = Some(org.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Produce the raw payload. Fails only if `inputs` cannot be hashed.
    pub fn build_raw(self) -> Result<serde_json::Value> {
        let now = Utc::now();
        let inputs_hash = digest::compute_digest(&self.inputs)?;
        let window = self.time_window.unwrap_or(TimeWindow {
            start: now,
            end: now,
        });

        let mut constraints = serde_json::json!({
            "policy_scope": self.policy_scope,
            "org_boundaries": self.org_boundaries,
            "time_window": {
                "start": window.start.to_rfc3339_opts(SecondsFormat::Micros, true),
                "end": window.end.to_rfc3339_opts(SecondsFormat::Micros, true),
            },
        });
        if let Some(rules) = self.compliance_rules {
            constraints["compliance_rules"] = serde_json::json!(rules);
        }

        let mut raw = serde_json::json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "schema_version": DECISION_SCHEMA_VERSION,
            "agent_id": self.agent_id,
            "agent_version": self.agent_version,
            "decision_type": self.decision_type.as_str(),
            "inputs_hash": inputs_hash,
            "outputs": self.outputs,
            "confidence": serde_json::to_value(self.confidence)?,
            "constraints_applied": constraints,
            "execution_ref": self.execution_ref,
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        if let Some(org) = self.organization_id {
            raw["organization_id"] = serde_json::json!(org);
        }
        if let Some(corr) = self.correlation_id {
            raw["correlation_id"] = serde_json::json!(corr);
        }
        Ok(raw)
    }
}
