use std::fmt::Write;

use serde::Serialize;

use crate::aggregator::{AggregateSummary, Severity, SubjectGroup};
use crate::resolver::{missing_by_weight, score, ArtifactMeasure, ArtifactResult, ScoreTally};

/// Format styles supported in default report rendering.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a readiness report string from a resolved result sequence.
pub fn render_readiness(
    results: &[ArtifactResult],
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_readiness_human(results),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReadinessReport::from(
            results,
        ))?),
    }
}

/// Produce a findings report string from an aggregate summary.
pub fn render_findings(summary: &AggregateSummary, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_findings_human(summary),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonFindingsReport::from(
            summary,
        ))?),
    }
}

fn render_readiness_human(results: &[ArtifactResult]) -> anyhow::Result<String> {
    let tally = score(results);
    let mut out = String::new();
    writeln!(
        out,
        "Readiness Score: {:.0}% ({}/{} points)",
        tally.percent(),
        tally.earned,
        tally.possible
    )?;
    writeln!(out)?;

    writeln!(out, "Artifacts:")?;
    for result in results {
        if result.exists {
            let found_at = result.found_at.as_deref().unwrap_or("?");
            writeln!(
                out,
                "  + {key:<18} found at {found_at} ({measure})",
                key = result.rule_key,
                found_at = found_at,
                measure = describe_measure(result.measure),
            )?;
        } else {
            writeln!(out, "  - {key:<18} missing", key = result.rule_key)?;
        }
    }

    let missing = missing_by_weight(results);
    if !missing.is_empty() {
        writeln!(out)?;
        writeln!(out, "Missing (by weight):")?;
        for result in missing {
            writeln!(
                out,
                "  - {key} ({weight} points)",
                key = result.rule_key,
                weight = result.weight
            )?;
        }
    }

    Ok(out)
}

fn render_findings_human(summary: &AggregateSummary) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Total Findings: {}", summary.total_count)?;
    writeln!(out)?;

    writeln!(out, "By Severity:")?;
    for severity in Severity::ALL {
        writeln!(
            out,
            "  {severity:>10}: {count}",
            severity = severity.as_str(),
            count = summary.count(severity)
        )?;
    }

    let groups = summary.sorted_groups();
    if groups.is_empty() {
        writeln!(out)?;
        writeln!(out, "No findings detected.")?;
        return Ok(out);
    }

    writeln!(out)?;
    writeln!(out, "Subjects (most severe first):")?;
    for group in groups {
        let fixes = if group.remediations.is_empty() {
            "no fix listed".to_string()
        } else {
            let fixes: Vec<_> = group.remediations.iter().cloned().collect();
            format!("fixes: {}", fixes.join(", "))
        };
        writeln!(
            out,
            "  - {subject} [{severity}] {count} finding(s), {fixes}",
            subject = group.subject,
            severity = group.max_severity,
            count = group.findings.len(),
        )?;
    }

    Ok(out)
}

fn describe_measure(measure: ArtifactMeasure) -> String {
    match measure {
        ArtifactMeasure::FileCount(count) => format!("{count} files"),
        ArtifactMeasure::LineCount(count) => format!("{count} lines"),
        ArtifactMeasure::MatchCount(count) => format!("{count} matches"),
        ArtifactMeasure::None => "not measured".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct JsonReadinessReport<'a> {
    score: ScoreTally,
    percent: f64,
    artifacts: &'a [ArtifactResult],
}

impl<'a> From<&'a [ArtifactResult]> for JsonReadinessReport<'a> {
    fn from(results: &'a [ArtifactResult]) -> Self {
        let tally = score(results);
        Self {
            score: tally,
            percent: tally.percent(),
            artifacts: results,
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonFindingsReport<'a> {
    total_count: usize,
    counts_by_severity: &'a std::collections::BTreeMap<Severity, usize>,
    subjects: Vec<&'a SubjectGroup>,
}

impl<'a> From<&'a AggregateSummary> for JsonFindingsReport<'a> {
    fn from(summary: &'a AggregateSummary) -> Self {
        Self {
            total_count: summary.total_count,
            counts_by_severity: &summary.counts_by_severity,
            subjects: summary.sorted_groups(),
        }
    }
}
