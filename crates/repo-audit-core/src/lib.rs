pub mod aggregator;
pub mod report;
pub mod resolver;

pub use aggregator::{
    aggregate, AggregateSummary, Finding, RawFinding, Severity, SubjectGroup, SubjectKey,
};
pub use report::{render_findings, render_readiness, OutputFormat};
pub use resolver::{
    default_rules, file_rules::FileRuleSource, file_rules::RuleSource,
    file_rules::StaticRuleSource, missing_by_weight, score, snapshot::SnapshotResolver,
    ArtifactMeasure, ArtifactResolver, ArtifactResult, ArtifactRule, RuleValidationError,
    ScoreTally,
};
