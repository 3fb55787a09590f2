//! Audit log exports and compliance reporting.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};
use governance_state::AuditLogEntry;
use serde::{Deserialize, Serialize};

use super::error::AuditError;

/// Output format for [`export_entries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Jsonl,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "ndjson" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AuditError::Export(format!("unknown export format '{other}'"))),
        }
    }
}

pub const CSV_HEADER: &str =
    "id,sequence,timestamp,principal_id,action,resource,resource_id,result,previous_hash,hash";

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render entries as CSV. Metadata is omitted.
pub fn to_csv(entries: &[AuditLogEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for e in entries {
        let row = [
            csv_field(&e.id),
            e.sequence.to_string(),
            e.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            csv_field(&e.principal_id),
            csv_field(&e.action),
            csv_field(&e.resource),
            csv_field(&e.resource_id),
            csv_field(&e.result),
            e.previous_hash.clone(),
            e.hash.clone(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Render entries in `format`.
pub fn export_entries(entries: &[AuditLogEntry], format: ExportFormat) -> Result<String, AuditError> {
    match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(entries).map_err(|e| AuditError::Export(e.to_string()))
        }
        ExportFormat::Jsonl => {
            let mut out = String::new();
            for e in entries {
                out.push_str(
                    &serde_json::to_string(e).map_err(|e| AuditError::Export(e.to_string()))?,
                );
                out.push('\n');
            }
            Ok(out)
        }
        ExportFormat::Csv => Ok(to_csv(entries)),
    }
}

/// Parse a JSON-lines export back into entries. Blank lines are skipped.
pub fn parse_jsonl(input: &str) -> Result<Vec<AuditLogEntry>, AuditError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| AuditError::Export(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Activity summary for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_to: Option<DateTime<Utc>>,
    pub total_entries: u64,
    pub unique_principals: u64,
    pub actions_by_type: BTreeMap<String, u64>,
    pub results_by_type: BTreeMap<String, u64>,
    pub generated_at: DateTime<Utc>,
}

impl ComplianceReport {
    pub fn from_entries(
        period_from: Option<DateTime<Utc>>,
        period_to: Option<DateTime<Utc>>,
        entries: &[AuditLogEntry],
    ) -> Self {
        let mut principals = BTreeSet::new();
        let mut actions_by_type = BTreeMap::new();
        let mut results_by_type = BTreeMap::new();
        for e in entries {
            principals.insert(e.principal_id.as_str());
            *actions_by_type.entry(e.action.clone()).or_insert(0) += 1;
            *results_by_type.entry(e.result.clone()).or_insert(0) += 1;
        }
        Self {
            period_from,
            period_to,
            total_entries: entries.len() as u64,
            unique_principals: principals.len() as u64,
            actions_by_type,
            results_by_type,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64, principal: &str, action: &str, result: &str) -> AuditLogEntry {
        AuditLogEntry {
            id: format!("e-{seq}"),
            sequence: seq,
            timestamp: DateTime::parse_from_rfc3339("2026-04-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            principal_id: principal.to_string(),
            action: action.to_string(),
            resource: "policies".to_string(),
            resource_id: "pol, \"main\"".to_string(),
            result: result.to_string(),
            metadata: serde_json::json!({}),
            previous_hash: "0".repeat(64),
            hash: "1".repeat(64),
        }
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        let csv = to_csv(&[entry(0, "alice", "PERMISSION_GRANTED", "allowed")]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.starts_with("e-0,0,2026-04-01T00:00:00.000000Z,alice,"));
        assert!(row.contains(r#","pol, ""main""","#));
    }

    #[test]
    fn test_jsonl_round_trip() {
        let entries = vec![
            entry(0, "alice", "PERMISSION_GRANTED", "allowed"),
            entry(1, "bob", "PERMISSION_DENIED", "denied"),
        ];
        let text = export_entries(&entries, ExportFormat::Jsonl).unwrap();
        assert_eq!(parse_jsonl(&format!("{text}\n\n")).unwrap(), entries);
    }

    #[test]
    fn test_parse_jsonl_reports_line() {
        let err = parse_jsonl("\n{not json}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_compliance_report_counts() {
        let entries = vec![
            entry(0, "alice", "PERMISSION_GRANTED", "allowed"),
            entry(1, "bob", "PERMISSION_DENIED", "denied"),
            entry(2, "alice", "PERMISSION_GRANTED", "allowed"),
        ];
        let report = ComplianceReport::from_entries(None, None, &entries);
        assert_eq!(report.total_entries, 3);
        assert_eq!(report.unique_principals, 2);
        assert_eq!(report.actions_by_type["PERMISSION_GRANTED"], 2);
        assert_eq!(report.results_by_type["denied"], 1);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("ndjson".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
