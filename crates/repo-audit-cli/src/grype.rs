//! Adapter for the grype scanner's JSON output format.
//!
//! The format is owned by the scanner, so conversion is deliberately loose:
//! every entry of `matches` yields one record, whatever fields it carries.
//! Missing fields stay `None` and the aggregator substitutes sentinels.

use repo_audit_core::RawFinding;
use serde_json::Value;
use tracing::debug;

/// Convert a parsed grype document into raw finding records.
pub fn raw_findings_from_document(document: &Value) -> Vec<RawFinding> {
    let Some(matches) = document.get("matches").and_then(Value::as_array) else {
        debug!("scanner document has no matches array");
        return Vec::new();
    };
    debug!(matches = matches.len(), "converting scanner matches");
    matches.iter().map(raw_finding_from_match).collect()
}

fn raw_finding_from_match(entry: &Value) -> RawFinding {
    let vulnerability = entry.get("vulnerability");
    let artifact = entry.get("artifact");
    RawFinding {
        id: string_field(vulnerability, "id"),
        severity: string_field(vulnerability, "severity"),
        subject_name: string_field(artifact, "name"),
        subject_version: string_field(artifact, "version"),
        subject_kind: string_field(artifact, "type"),
        remediations: string_list(
            vulnerability
                .and_then(|value| value.get("fix"))
                .and_then(|fix| fix.get("versions")),
        ),
        detail: string_field(vulnerability, "description"),
        urls: string_list(vulnerability.and_then(|value| value.get("urls"))),
    }
}

fn string_field(value: Option<&Value>, key: &str) -> Option<String> {
    value
        .and_then(|value| value.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
