use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;

use super::{default_rules, ArtifactRule};

/// Abstraction over rule loading so callers can inject synthetic rule sets and
/// swap backends (file, in-memory) transparently.
pub trait RuleSource: Send + Sync {
    /// Retrieve the full rule set currently active.
    fn load_rules(&self) -> Result<Vec<ArtifactRule>>;

    /// Fetch a single rule by key if it exists.
    fn get_rule(&self, key: &str) -> Result<Option<ArtifactRule>>;
}

/// Loads artifact rules from a JSON rules file.
pub struct FileRuleSource {
    path: PathBuf,
    cache: OnceCell<Vec<ArtifactRule>>,
}

impl FileRuleSource {
    /// Create a source reading the given rules file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<Vec<ArtifactRule>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read rules file at {}", self.path.display()))?;
        let items: Vec<JsonRule> = serde_json::from_str(&raw).with_context(|| {
            format!("invalid JSON structure in rules file at {}", self.path.display())
        })?;

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(items.len());
        for item in items {
            if !seen.insert(item.key.clone()) {
                return Err(anyhow::anyhow!("duplicate rule key `{}`", item.key));
            }
            let rule = ArtifactRule::new(
                item.key,
                item.description,
                item.primary_path,
                item.alternatives,
                item.weight,
                item.excluded_file_names,
            )
            .with_context(|| format!("invalid rule in {}", self.path.display()))?;
            rules.push(rule);
        }
        Ok(rules)
    }
}

impl RuleSource for FileRuleSource {
    fn load_rules(&self) -> Result<Vec<ArtifactRule>> {
        let rules = self.cache.get_or_try_init(|| self.load())?;
        Ok(rules.clone())
    }

    fn get_rule(&self, key: &str) -> Result<Option<ArtifactRule>> {
        let rules = self.load_rules()?;
        Ok(rules.into_iter().find(|rule| rule.key == key))
    }
}

/// In-memory rule source; carries the built-in defaults unless told otherwise.
pub struct StaticRuleSource {
    rules: Vec<ArtifactRule>,
}

impl StaticRuleSource {
    pub fn new(rules: Vec<ArtifactRule>) -> Self {
        Self { rules }
    }
}

impl Default for StaticRuleSource {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RuleSource for StaticRuleSource {
    fn load_rules(&self) -> Result<Vec<ArtifactRule>> {
        Ok(self.rules.clone())
    }

    fn get_rule(&self, key: &str) -> Result<Option<ArtifactRule>> {
        Ok(self.rules.iter().find(|rule| rule.key == key).cloned())
    }
}

#[derive(serde::Deserialize)]
struct JsonRule {
    key: String,
    #[serde(default)]
    description: String,
    primary_path: String,
    #[serde(default)]
    alternatives: Vec<String>,
    weight: u32,
    #[serde(default)]
    excluded_file_names: Vec<String>,
}
