use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

/// Sentinel substituted for subject fields a scanner failed to supply.
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// Fixed severity ladder, most severe first.
///
/// Declaration order is the rank: `Critical < High < ... < Unknown`, so
/// `min` of two severities picks the more severe one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
    Unknown,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Negligible,
        Severity::Unknown,
    ];

    /// Parse a scanner-reported severity string. Anything outside the six
    /// canonical spellings normalizes to `Unknown`; parsing never fails.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Critical" => Severity::Critical,
            "High" => Severity::High,
            "Medium" => Severity::Medium,
            "Low" => Severity::Low,
            "Negligible" => Severity::Negligible,
            _ => Severity::Unknown,
        }
    }

    /// Position in the ladder; `0` is most severe.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Negligible => "Negligible",
            Severity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw record handed over by a scanner-output adapter.
///
/// Every field is optional: the aggregator substitutes sentinels for whatever
/// is missing instead of rejecting the record. Unknown extra fields in the
/// source document are the adapter's problem, not this type's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFinding {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub subject_version: Option<String>,
    #[serde(default)]
    pub subject_kind: Option<String>,
    /// Versions (or other actions) that resolve the finding.
    #[serde(default)]
    pub remediations: Vec<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A single retained finding. Always fully populated; missing input fields
/// have already been replaced with sentinels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub finding_id: String,
    pub severity: Severity,
    pub subject_name: String,
    pub subject_version: String,
    pub subject_kind: String,
    pub remediations: BTreeSet<String>,
    pub detail: Option<String>,
    pub urls: Vec<String>,
}

impl Finding {
    fn from_raw(raw: RawFinding) -> Self {
        Self {
            finding_id: raw.id.unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            severity: raw
                .severity
                .as_deref()
                .map_or(Severity::Unknown, Severity::parse),
            subject_name: raw
                .subject_name
                .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            subject_version: raw
                .subject_version
                .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            subject_kind: raw
                .subject_kind
                .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string()),
            remediations: raw.remediations.into_iter().collect(),
            detail: raw.detail,
            urls: raw.urls,
        }
    }
}

/// Aggregation key: the (name, version) pair a finding is about.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SubjectKey {
    pub name: String,
    pub version: String,
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// All findings for one subject, with the worst severity seen and the union
/// of their remediations.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectGroup {
    pub subject: SubjectKey,
    pub subject_kind: String,
    /// Append order is encounter order.
    pub findings: Vec<Finding>,
    pub max_severity: Severity,
    pub remediations: BTreeSet<String>,
}

impl SubjectGroup {
    fn new(subject: SubjectKey, subject_kind: String) -> Self {
        Self {
            subject,
            subject_kind,
            findings: Vec::new(),
            max_severity: Severity::Unknown,
            remediations: BTreeSet::new(),
        }
    }

    fn push(&mut self, finding: Finding) {
        self.max_severity = self.max_severity.min(finding.severity);
        self.remediations.extend(finding.remediations.iter().cloned());
        self.findings.push(finding);
    }
}

/// Top-level aggregation result. Owns every group and finding it contains.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    pub total_count: usize,
    /// All six severity keys are always present, zero-filled.
    pub counts_by_severity: BTreeMap<Severity, usize>,
    /// Encounter order preserved within each bucket.
    pub findings_by_severity: BTreeMap<Severity, Vec<Finding>>,
    #[serde(serialize_with = "serialize_groups")]
    pub groups_by_subject: HashMap<SubjectKey, SubjectGroup>,
}

impl AggregateSummary {
    /// Presentation order for reports: most severe subjects first, larger
    /// groups breaking ties, subject coordinates keeping the order total.
    pub fn sorted_groups(&self) -> Vec<&SubjectGroup> {
        let mut groups: Vec<_> = self.groups_by_subject.values().collect();
        groups.sort_by(|a, b| {
            a.max_severity
                .cmp(&b.max_severity)
                .then_with(|| b.findings.len().cmp(&a.findings.len()))
                .then_with(|| a.subject.cmp(&b.subject))
        });
        groups
    }

    /// Count for one severity bucket; total because every bucket is seeded.
    pub fn count(&self, severity: Severity) -> usize {
        self.counts_by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Single linear pass over raw records. Total and pure: malformed severities
/// become `Unknown`, missing subject fields become sentinels, and every input
/// record produces exactly one retained finding.
pub fn aggregate<I>(records: I) -> AggregateSummary
where
    I: IntoIterator<Item = RawFinding>,
{
    let mut counts_by_severity: BTreeMap<Severity, usize> =
        Severity::ALL.iter().map(|&severity| (severity, 0)).collect();
    let mut findings_by_severity: BTreeMap<Severity, Vec<Finding>> = Severity::ALL
        .iter()
        .map(|&severity| (severity, Vec::new()))
        .collect();
    let mut groups_by_subject: HashMap<SubjectKey, SubjectGroup> = HashMap::new();
    let mut total_count = 0usize;

    for raw in records {
        let finding = Finding::from_raw(raw);
        total_count += 1;
        *counts_by_severity.entry(finding.severity).or_insert(0) += 1;

        let key = SubjectKey {
            name: finding.subject_name.clone(),
            version: finding.subject_version.clone(),
        };
        groups_by_subject
            .entry(key.clone())
            .or_insert_with(|| SubjectGroup::new(key, finding.subject_kind.clone()))
            .push(finding.clone());

        findings_by_severity
            .entry(finding.severity)
            .or_default()
            .push(finding);
    }

    debug!(
        total = total_count,
        subjects = groups_by_subject.len(),
        "aggregated findings"
    );

    AggregateSummary {
        total_count,
        counts_by_severity,
        findings_by_severity,
        groups_by_subject,
    }
}

fn serialize_groups<S>(
    groups: &HashMap<SubjectKey, SubjectGroup>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let ordered: BTreeMap<String, &SubjectGroup> = groups
        .iter()
        .map(|(key, group)| (key.to_string(), group))
        .collect();
    ordered.serialize(serializer)
}
