//! Decision event validation.
//!
//! [`validate_decision_event`] walks the whole payload and collects every
//! violated field path before returning; it never stops at the first
//! problem and never coerces a value into shape.
//!
//! Checks:
//! 1. Required fields are present and non-empty.
//! 2. Field types match (string, number, object, list of strings).
//! 3. `decision_type` is a known [`DecisionType`].
//! 4. `agent_version` is `MAJOR.MINOR.PATCH` (pre-release/build suffixes allowed).
//! 5. `inputs_hash` is a 64-char hex digest.
//! 6. Confidence scores lie in `[0, 1]` and `confidence_band.lower <= upper`.
//! 7. Timestamps parse as RFC 3339 and `time_window.start <= end`.
//! 8. `schema_version`, when present, is `MAJOR.MINOR` with major `1`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use super::decision::{
    Confidence, ConfidenceBand, ConstraintsApplied, DecisionEvent, DecisionType, TimeWindow,
};
use super::digest::is_hex_digest;
use super::error::{FieldViolation, ValidationError, ViolationCode};

/// Schema major version this engine accepts.
pub const SUPPORTED_SCHEMA_MAJOR: u64 = 1;

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$",
    )
    .expect("valid semver regex")
});

static SCHEMA_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)$").expect("valid schema version regex"));

/// Accumulates violations while fields are extracted.
#[derive(Default)]
struct Checker {
    violations: Vec<FieldViolation>,
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

impl Checker {
    fn push(&mut self, path: impl Into<String>, code: ViolationCode, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            path: path.into(),
            code,
            message: message.into(),
        });
    }

    /// Present and non-null, else a missing-required violation.
    fn present<'a>(&mut self, obj: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
        let key = path.rsplit('.').next().unwrap_or(path);
        match obj.get(key) {
            None | Some(Value::Null) => {
                self.push(path, ViolationCode::MissingRequired, "field is required");
                None
            }
            Some(v) => Some(v),
        }
    }

    fn string(&mut self, value: &Value, path: &str) -> Option<String> {
        match value.as_str() {
            Some("") => {
                self.push(path, ViolationCode::MissingRequired, "must not be empty");
                None
            }
            Some(s) => Some(s.to_string()),
            None => {
                self.push(path, ViolationCode::TypeMismatch, "expected a string");
                None
            }
        }
    }

    fn required_str(&mut self, obj: &Map<String, Value>, path: &str) -> Option<String> {
        let v = self.present(obj, path)?;
        self.string(v, path)
    }

    fn optional_str(&mut self, obj: &Map<String, Value>, path: &str) -> Option<String> {
        let key = path.rsplit('.').next().unwrap_or(path);
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => self.string(v, path),
        }
    }

    fn required_object<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        path: &str,
    ) -> Option<&'a Map<String, Value>> {
        let v = self.present(obj, path)?;
        match v.as_object() {
            Some(o) => Some(o),
            None => {
                self.push(path, ViolationCode::TypeMismatch, "expected an object");
                None
            }
        }
    }

    fn unit_interval(&mut self, value: &Value, path: &str) -> Option<f64> {
        let Some(n) = value.as_f64() else {
            self.push(path, ViolationCode::TypeMismatch, "expected a number");
            return None;
        };
        if !(0.0..=1.0).contains(&n) {
            self.push(
                path,
                ViolationCode::ConstraintViolation,
                format!("{n} is outside [0, 1]"),
            );
            return None;
        }
        Some(n)
    }

    fn required_unit(&mut self, obj: &Map<String, Value>, path: &str) -> Option<f64> {
        let v = self.present(obj, path)?;
        self.unit_interval(v, path)
    }

    fn string_list(&mut self, value: &Value, path: &str) -> Option<Vec<String>> {
        let Some(items) = value.as_array() else {
            self.push(path, ViolationCode::TypeMismatch, "expected a list of strings");
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    self.push(
                        format!("{path}[{i}]"),
                        ViolationCode::TypeMismatch,
                        "expected a string",
                    );
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }

    fn required_list(&mut self, obj: &Map<String, Value>, path: &str) -> Option<Vec<String>> {
        let v = self.present(obj, path)?;
        self.string_list(v, path)
    }

    fn timestamp(&mut self, obj: &Map<String, Value>, path: &str) -> Option<DateTime<Utc>> {
        let raw = self.required_str(obj, path)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                self.push(
                    path,
                    ViolationCode::InvalidInput,
                    format!("not an RFC 3339 timestamp: {e}"),
                );
                None
            }
        }
    }

    fn confidence(&mut self, obj: &Map<String, Value>, prefix: &str) -> Option<Confidence> {
        let coverage = self.required_unit(obj, &join(prefix, "coverage"));
        let completeness = self.required_unit(obj, &join(prefix, "completeness"));
        let overall = self.required_unit(obj, &join(prefix, "overall"));

        let band_path = join(prefix, "confidence_band");
        let mut band_ok = true;
        let band = match obj.get("confidence_band") {
            None | Some(Value::Null) => None,
            Some(Value::Object(b)) => {
                let lower = self.required_unit(b, &join(&band_path, "lower"));
                let upper = self.required_unit(b, &join(&band_path, "upper"));
                match (lower, upper) {
                    (Some(lower), Some(upper)) if lower > upper => {
                        self.push(
                            band_path.as_str(),
                            ViolationCode::ConstraintViolation,
                            format!("lower {lower} exceeds upper {upper}"),
                        );
                        band_ok = false;
                        None
                    }
                    (Some(lower), Some(upper)) => Some(ConfidenceBand { lower, upper }),
                    _ => {
                        band_ok = false;
                        None
                    }
                }
            }
            Some(_) => {
                self.push(band_path.as_str(), ViolationCode::TypeMismatch, "expected an object");
                band_ok = false;
                None
            }
        };

        Some(Confidence {
            coverage: coverage?,
            completeness: completeness?,
            overall: overall?,
            confidence_band: if band_ok { band } else { return None },
        })
    }

    fn constraints(
        &mut self,
        obj: &Map<String, Value>,
        prefix: &str,
    ) -> Option<ConstraintsApplied> {
        let policy_scope = self.required_list(obj, &join(prefix, "policy_scope"));
        let org_boundaries = self.required_list(obj, &join(prefix, "org_boundaries"));

        let window_path = join(prefix, "time_window");
        let time_window = self
            .required_object(obj, &window_path)
            .and_then(|w| {
                let start = self.timestamp(w, &join(&window_path, "start"));
                let end = self.timestamp(w, &join(&window_path, "end"));
                Some((start?, end?))
            })
            .and_then(|(start, end)| {
                if start > end {
                    self.push(
                        window_path.as_str(),
                        ViolationCode::ConstraintViolation,
                        "start is after end",
                    );
                    None
                } else {
                    Some(TimeWindow { start, end })
                }
            });

        let rules_path = join(prefix, "compliance_rules");
        let mut rules_ok = true;
        let compliance_rules = match obj.get("compliance_rules") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let rules = self.string_list(v, &rules_path);
                rules_ok = rules.is_some();
                rules
            }
        };

        if !rules_ok {
            return None;
        }
        Some(ConstraintsApplied {
            policy_scope: policy_scope?,
            org_boundaries: org_boundaries?,
            time_window: time_window?,
            compliance_rules,
        })
    }
}

/// Validate a raw decision payload.
///
/// Returns the typed event, or a [`ValidationError`] listing every
/// violated field path. Pure: no I/O, no logging.
pub fn validate_decision_event(raw: &Value) -> Result<DecisionEvent, ValidationError> {
    let Some(obj) = raw.as_object() else {
        return Err(ValidationError {
            violations: vec![FieldViolation {
                path: "$".to_string(),
                code: ViolationCode::InvalidInput,
                message: "decision event must be a JSON object".to_string(),
            }],
        });
    };

    let mut c = Checker::default();

    let id = c.required_str(obj, "id");

    let schema_version = c.optional_str(obj, "schema_version").and_then(|v| {
        let Some(caps) = SCHEMA_VERSION_RE.captures(&v) else {
            c.push(
                "schema_version",
                ViolationCode::InvalidInput,
                format!("'{v}' is not MAJOR.MINOR"),
            );
            return None;
        };
        let major: Option<u64> = caps.get(1).and_then(|m| m.as_str().parse().ok());
        if major != Some(SUPPORTED_SCHEMA_MAJOR) {
            c.push(
                "schema_version",
                ViolationCode::SchemaVersionMismatch,
                format!("major version of '{v}' is not {SUPPORTED_SCHEMA_MAJOR}"),
            );
            return None;
        }
        Some(v)
    });
    let agent_id = c.required_str(obj, "agent_id");

    let agent_version = c.required_str(obj, "agent_version").and_then(|v| {
        if SEMVER_RE.is_match(&v) {
            Some(v)
        } else {
            c.push(
                "agent_version",
                ViolationCode::InvalidInput,
                format!("'{v}' is not MAJOR.MINOR.PATCH"),
            );
            None
        }
    });

    let decision_type = c.required_str(obj, "decision_type").and_then(|v| {
        let parsed = DecisionType::parse(&v);
        if parsed.is_none() {
            c.push(
                "decision_type",
                ViolationCode::InvalidInput,
                format!("unknown decision type '{v}'"),
            );
        }
        parsed
    });

    let inputs_hash = c.required_str(obj, "inputs_hash").and_then(|v| {
        if is_hex_digest(&v) {
            Some(v)
        } else {
            c.push(
                "inputs_hash",
                ViolationCode::InvalidInput,
                "expected a 64-character hex digest",
            );
            None
        }
    });

    let outputs = c.required_object(obj, "outputs").cloned();

    let confidence = c
        .required_object(obj, "confidence")
        .and_then(|o| c.confidence(o, "confidence"));

    let constraints_applied = c
        .required_object(obj, "constraints_applied")
        .and_then(|o| c.constraints(o, "constraints_applied"));

    let execution_ref = c.required_str(obj, "execution_ref");
    let timestamp = c.timestamp(obj, "timestamp");
    let organization_id = c.optional_str(obj, "organization_id");
    let correlation_id = c.optional_str(obj, "correlation_id");

    if !c.violations.is_empty() {
        return Err(ValidationError {
            violations: c.violations,
        });
    }

    match (
        id,
        agent_id,
        agent_version,
        decision_type,
        inputs_hash,
        outputs,
        confidence,
        constraints_applied,
        execution_ref,
        timestamp,
    ) {
        (
            Some(id),
            Some(agent_id),
            Some(agent_version),
            Some(decision_type),
            Some(inputs_hash),
            Some(outputs),
            Some(confidence),
            Some(constraints_applied),
            Some(execution_ref),
            Some(timestamp),
        ) => Ok(DecisionEvent {
            id,
            schema_version,
            agent_id,
            agent_version,
            decision_type,
            inputs_hash,
            outputs,
            confidence,
            constraints_applied,
            execution_ref,
            timestamp,
            organization_id,
            correlation_id,
        }),
        // every None above pushed a violation, so this arm is unreachable in practice
        _ => Err(ValidationError {
            violations: vec![FieldViolation {
                path: "$".to_string(),
                code: ViolationCode::InvalidInput,
                message: "incomplete decision event".to_string(),
            }],
        }),
    }
}
