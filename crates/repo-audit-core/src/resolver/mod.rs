use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file_rules;
pub mod snapshot;

/// Declarative expectation for a single repository artifact.
///
/// A rule names one conceptual artifact (docs, test suite, automation) and the
/// conventional locations it may live at. Candidates are checked in order:
/// `primary_path` first, then each entry of `alternatives`; the first hit wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRule {
    /// Stable identifier (e.g. `readme`, `tests`).
    pub key: String,
    /// Human-readable summary shown in reports.
    pub description: String,
    /// First location checked; a literal path or a glob pattern.
    pub primary_path: String,
    /// Fallback candidates, consulted in listed order after the primary path.
    pub alternatives: Vec<String>,
    /// Contribution to the total possible score.
    pub weight: u32,
    /// File names ignored when judging whether a directory candidate is
    /// non-empty, and when counting its files.
    #[serde(default)]
    pub excluded_file_names: BTreeSet<String>,
}

impl ArtifactRule {
    /// Construct a new rule, validating invariants before returning.
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        primary_path: impl Into<String>,
        alternatives: Vec<String>,
        weight: u32,
        excluded_file_names: impl IntoIterator<Item = String>,
    ) -> Result<Self, RuleValidationError> {
        let rule = Self {
            key: key.into(),
            description: description.into(),
            primary_path: primary_path.into(),
            alternatives,
            weight,
            excluded_file_names: excluded_file_names.into_iter().collect(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Validate invariants for existing rule definitions.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.key.trim().is_empty() {
            return Err(RuleValidationError::EmptyKey);
        }
        if self.primary_path.is_empty() {
            return Err(RuleValidationError::EmptyPrimaryPath {
                rule_key: self.key.clone(),
            });
        }
        if self.weight == 0 {
            return Err(RuleValidationError::InvalidWeight {
                rule_key: self.key.clone(),
            });
        }
        if self.alternatives.iter().any(String::is_empty) {
            return Err(RuleValidationError::EmptyAlternative {
                rule_key: self.key.clone(),
            });
        }
        Ok(())
    }

    /// Candidate locations in evaluation order: primary path, then alternatives.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_path.as_str())
            .chain(self.alternatives.iter().map(String::as_str))
    }
}

/// Errors emitted while validating rule definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleValidationError {
    #[error("rule key must not be blank")]
    EmptyKey,
    #[error("rule `{rule_key}` primary path must not be empty")]
    EmptyPrimaryPath { rule_key: String },
    #[error("rule `{rule_key}` weight must be positive")]
    InvalidWeight { rule_key: String },
    #[error("rule `{rule_key}` has an empty alternative candidate")]
    EmptyAlternative { rule_key: String },
}

/// How a matched artifact was measured, chosen by what kind of candidate won.
///
/// A directory yields a file count, a regular file a line count, a glob
/// pattern the number of matched paths. `None` means the rule matched nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactMeasure {
    FileCount(usize),
    LineCount(usize),
    MatchCount(usize),
    None,
}

/// Outcome of evaluating one rule against a file-system snapshot.
///
/// Carries copies of the owning rule's key and weight so that scoring needs
/// nothing beyond the result sequence itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactResult {
    pub rule_key: String,
    pub weight: u32,
    pub exists: bool,
    /// The candidate path or pattern that matched, verbatim from the rule.
    pub found_at: Option<String>,
    pub measure: ArtifactMeasure,
}

impl ArtifactResult {
    /// Result for a rule whose candidate `found_at` matched.
    pub fn found(rule: &ArtifactRule, found_at: &str, measure: ArtifactMeasure) -> Self {
        Self {
            rule_key: rule.key.clone(),
            weight: rule.weight,
            exists: true,
            found_at: Some(found_at.to_string()),
            measure,
        }
    }

    /// Result for a rule none of whose candidates matched.
    pub fn missing(rule: &ArtifactRule) -> Self {
        Self {
            rule_key: rule.key.clone(),
            weight: rule.weight,
            exists: false,
            found_at: None,
            measure: ArtifactMeasure::None,
        }
    }
}

/// Earned/possible weight totals folded over a result sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTally {
    pub earned: u32,
    pub possible: u32,
}

impl ScoreTally {
    /// Percentage of possible weight earned; `0.0` when nothing was possible.
    pub fn percent(&self) -> f64 {
        if self.possible == 0 {
            return 0.0;
        }
        f64::from(self.earned) / f64::from(self.possible) * 100.0
    }
}

/// Fold rule weights over a result sequence. Pure and total: every result
/// contributes to `possible`, present ones also to `earned`.
pub fn score(results: &[ArtifactResult]) -> ScoreTally {
    let mut tally = ScoreTally::default();
    for result in results {
        tally.possible += result.weight;
        if result.exists {
            tally.earned += result.weight;
        }
    }
    tally
}

/// Resolves artifact rules against some view of a repository.
pub trait ArtifactResolver {
    /// Evaluate every rule, in order, returning exactly one result per rule.
    fn resolve(&self, rules: &[ArtifactRule]) -> Vec<ArtifactResult>;
}

/// Missing artifacts ordered by descending weight, the order reports use for
/// their top recommendations.
pub fn missing_by_weight(results: &[ArtifactResult]) -> Vec<&ArtifactResult> {
    let mut missing: Vec<_> = results.iter().filter(|result| !result.exists).collect();
    missing.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.rule_key.cmp(&b.rule_key)));
    missing
}

/// The built-in rule set: README equivalents, agent guidelines, agent
/// automation (guideline file excluded from the emptiness check so it is not
/// counted twice), and a test directory with its conventional aliases.
pub fn default_rules() -> Vec<ArtifactRule> {
    vec![
        ArtifactRule {
            key: "readme".to_string(),
            description: "Project overview and getting started guide".to_string(),
            primary_path: "README.md".to_string(),
            alternatives: vec![
                "readme.md".to_string(),
                "README".to_string(),
                "README.rst".to_string(),
            ],
            weight: 10,
            excluded_file_names: BTreeSet::new(),
        },
        ArtifactRule {
            key: "agent-guidelines".to_string(),
            description: "Static instructions for coding agents".to_string(),
            primary_path: "AGENTS.md".to_string(),
            alternatives: vec![".agents/repo.md".to_string(), "CLAUDE.md".to_string()],
            weight: 30,
            excluded_file_names: BTreeSet::new(),
        },
        ArtifactRule {
            key: "agent-automation".to_string(),
            description: "Setup scripts and task automation for coding agents".to_string(),
            primary_path: ".agents/".to_string(),
            alternatives: vec![".agents/setup.sh".to_string(), "scripts/agents/".to_string()],
            weight: 30,
            excluded_file_names: std::iter::once("repo.md".to_string()).collect(),
        },
        ArtifactRule {
            key: "tests".to_string(),
            description: "Tests that allow agents to verify their changes".to_string(),
            primary_path: "tests/".to_string(),
            alternatives: vec![
                "test/".to_string(),
                "__tests__/".to_string(),
                "spec/".to_string(),
                "e2e/".to_string(),
                "integration/".to_string(),
                "cypress/".to_string(),
                "playwright/".to_string(),
            ],
            weight: 30,
            excluded_file_names: BTreeSet::new(),
        },
    ]
}
