use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument, trace, warn};
use walkdir::WalkDir;

use super::{ArtifactMeasure, ArtifactResolver, ArtifactResult, ArtifactRule};

/// Resolver backed by a read-only view of a repository checkout on disk.
///
/// Evaluation is fail-safe throughout: unreadable directories and files demote
/// the candidate to "not found" and evaluation moves on; no file-system error
/// escapes a `resolve` call.
pub struct SnapshotResolver {
    root: PathBuf,
}

impl SnapshotResolver {
    /// Create a resolver rooted at the given repository directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_rule(&self, rule: &ArtifactRule) -> ArtifactResult {
        for candidate in rule.candidates() {
            if is_glob_pattern(candidate) {
                let matches = self.glob_match_count(candidate);
                if matches > 0 {
                    trace!(rule = %rule.key, %candidate, matches, "glob candidate matched");
                    return ArtifactResult::found(
                        rule,
                        candidate,
                        ArtifactMeasure::MatchCount(matches),
                    );
                }
                continue;
            }

            let full = self.root.join(candidate);
            if full.is_file() {
                if let Some(lines) = count_lines(&full) {
                    trace!(rule = %rule.key, %candidate, lines, "file candidate matched");
                    return ArtifactResult::found(rule, candidate, ArtifactMeasure::LineCount(lines));
                }
            } else if full.is_dir()
                && dir_has_countable_entry(&full, &rule.excluded_file_names)
            {
                let files = count_files_recursive(&full, &rule.excluded_file_names);
                trace!(rule = %rule.key, %candidate, files, "directory candidate matched");
                return ArtifactResult::found(rule, candidate, ArtifactMeasure::FileCount(files));
            }
        }
        ArtifactResult::missing(rule)
    }

    /// Number of paths under the root matching a glob candidate. Invalid
    /// patterns and unreadable matches count as unmatched.
    fn glob_match_count(&self, pattern: &str) -> usize {
        let rooted = self.root.join(pattern);
        let Some(rooted) = rooted.to_str() else {
            return 0;
        };
        match glob::glob(rooted) {
            Ok(paths) => paths.filter_map(Result::ok).count(),
            Err(err) => {
                warn!(%pattern, error = %err, "invalid glob candidate, treating as unmatched");
                0
            }
        }
    }
}

impl ArtifactResolver for SnapshotResolver {
    #[instrument(
        name = "resolve_snapshot",
        skip(self, rules),
        fields(root = %self.root.display(), rules = rules.len())
    )]
    fn resolve(&self, rules: &[ArtifactRule]) -> Vec<ArtifactResult> {
        let results: Vec<_> = rules.iter().map(|rule| self.resolve_rule(rule)).collect();
        let found = results.iter().filter(|result| result.exists).count();
        debug!(found, missing = results.len() - found, "snapshot resolved");
        results
    }
}

fn is_glob_pattern(candidate: &str) -> bool {
    candidate.chars().any(|c| matches!(c, '*' | '?' | '['))
}

/// Newline count + 1, read as raw bytes so malformed encodings never fail.
/// Returns `None` when the file cannot be read at all.
fn count_lines(path: &Path) -> Option<usize> {
    match fs::read(path) {
        Ok(bytes) => Some(bytes.iter().filter(|&&byte| byte == b'\n').count() + 1),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable file candidate, skipping");
            None
        }
    }
}

/// A directory counts as present iff it holds at least one entry whose name is
/// not excluded. Unreadable directories count as absent.
fn dir_has_countable_entry(dir: &Path, excluded: &BTreeSet<String>) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "unreadable directory, treating as absent");
            return false;
        }
    };
    entries
        .flatten()
        .any(|entry| !excluded.contains(entry.file_name().to_string_lossy().as_ref()))
}

/// Recursive count of regular files, skipping excluded names and anything the
/// walker cannot read.
fn count_files_recursive(dir: &Path, excluded: &BTreeSet<String>) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !excluded.contains(entry.file_name().to_string_lossy().as_ref()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{score, ScoreTally};
    use std::fs;

    fn rule(
        key: &str,
        primary: &str,
        alternatives: &[&str],
        weight: u32,
        excluded: &[&str],
    ) -> ArtifactRule {
        ArtifactRule::new(
            key,
            "",
            primary,
            alternatives.iter().map(|alt| alt.to_string()).collect(),
            weight,
            excluded.iter().map(|name| name.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn resolves_file_and_fallback_directory() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("x.md"), "line one\nline two").unwrap();
        fs::create_dir(temp.path().join("z")).unwrap();
        fs::write(temp.path().join("z/f.txt"), "payload").unwrap();

        let rules = vec![
            rule("A", "x.md", &[], 10, &[]),
            rule("B", "y/", &["z/"], 5, &[]),
        ];
        let resolver = SnapshotResolver::new(temp.path());
        let results = resolver.resolve(&rules);

        assert_eq!(results.len(), 2);
        assert!(results[0].exists);
        assert_eq!(results[0].found_at.as_deref(), Some("x.md"));
        assert_eq!(results[0].measure, ArtifactMeasure::LineCount(2));
        assert!(results[1].exists);
        assert_eq!(results[1].found_at.as_deref(), Some("z/"));
        assert_eq!(results[1].measure, ArtifactMeasure::FileCount(1));
        assert_eq!(
            score(&results),
            ScoreTally {
                earned: 15,
                possible: 15
            }
        );
    }

    #[test]
    fn primary_match_short_circuits_alternatives() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("tests")).unwrap();
        fs::write(temp.path().join("tests/a.rs"), "#[test]\n").unwrap();
        fs::create_dir(temp.path().join("spec")).unwrap();
        fs::write(temp.path().join("spec/b.rs"), "#[test]\n").unwrap();

        let rules = vec![rule("tests", "tests/", &["spec/"], 30, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert_eq!(results[0].found_at.as_deref(), Some("tests/"));
    }

    #[test]
    fn directory_with_only_excluded_entries_is_absent() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join(".agents")).unwrap();
        fs::write(temp.path().join(".agents/repo.md"), "guidelines").unwrap();

        let rules = vec![rule("automation", ".agents/", &[], 30, &["repo.md"])];
        let resolver = SnapshotResolver::new(temp.path());
        let results = resolver.resolve(&rules);
        assert!(!results[0].exists);
        assert_eq!(results[0].measure, ArtifactMeasure::None);
        assert!(results[0].found_at.is_none());

        fs::write(temp.path().join(".agents/setup.sh"), "#!/bin/sh\n").unwrap();
        let results = resolver.resolve(&rules);
        assert!(results[0].exists);
        // repo.md stays out of the count as well
        assert_eq!(results[0].measure, ArtifactMeasure::FileCount(1));
    }

    #[test]
    fn empty_directory_is_absent() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("tests")).unwrap();
        let rules = vec![rule("tests", "tests/", &[], 30, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert!(!results[0].exists);
    }

    #[test]
    fn glob_candidate_counts_matches() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.workflow.yml"), "on: push\n").unwrap();
        fs::write(temp.path().join("b.workflow.yml"), "on: push\n").unwrap();

        let rules = vec![rule("workflows", "*.workflow.yml", &[], 10, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert!(results[0].exists);
        assert_eq!(results[0].found_at.as_deref(), Some("*.workflow.yml"));
        assert_eq!(results[0].measure, ArtifactMeasure::MatchCount(2));
    }

    #[test]
    fn unmatched_glob_falls_through_to_alternative() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("pipeline.yaml"), "steps: []\n").unwrap();

        let rules = vec![rule("ci", "*.workflow.yml", &["pipeline.yaml"], 10, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert!(results[0].exists);
        assert_eq!(results[0].found_at.as_deref(), Some("pipeline.yaml"));
    }

    #[test]
    fn directory_file_count_is_recursive() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("tests/unit")).unwrap();
        fs::write(temp.path().join("tests/top.rs"), "").unwrap();
        fs::write(temp.path().join("tests/unit/deep.rs"), "").unwrap();

        let rules = vec![rule("tests", "tests/", &[], 30, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert_eq!(results[0].measure, ArtifactMeasure::FileCount(2));
    }

    #[test]
    fn empty_file_counts_one_line() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("README.md"), "").unwrap();
        let rules = vec![rule("readme", "README.md", &[], 10, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert_eq!(results[0].measure, ArtifactMeasure::LineCount(1));
    }

    #[test]
    fn malformed_encoding_still_counts_lines() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("notes"), [0xff, 0xfe, b'\n', 0x80]).unwrap();
        let rules = vec![rule("notes", "notes", &[], 10, &[])];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        assert_eq!(results[0].measure, ArtifactMeasure::LineCount(2));
    }

    #[test]
    fn results_preserve_rule_order_and_count() {
        let temp = tempfile::tempdir().unwrap();
        let rules = vec![
            rule("z", "nothing-here", &[], 1, &[]),
            rule("a", "also-nothing", &[], 2, &[]),
            rule("m", "still-nothing", &[], 3, &[]),
        ];
        let results = SnapshotResolver::new(temp.path()).resolve(&rules);
        let keys: Vec<_> = results.iter().map(|result| result.rule_key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert!(results.iter().all(|result| !result.exists));
    }
}
