mod grype;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repo_audit_core::{
    aggregate, default_rules, render_findings, render_readiness, ArtifactResolver, ArtifactRule,
    FileRuleSource, OutputFormat, RuleSource, SnapshotResolver,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "repo-audit",
    author,
    version,
    about = "Repository readiness and vulnerability summary CLI"
)]
struct Cli {
    /// JSON file overriding the built-in artifact rules
    #[arg(long = "rules-file", value_name = "FILE", global = true)]
    rules_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve artifact rules against a repository and print the scorecard
    Readiness {
        /// Repository root to scan
        #[arg(long, value_name = "DIR", default_value = ".")]
        repo: PathBuf,
        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Aggregate a scanner's JSON output into a severity summary
    Findings {
        /// Scanner output file (grype JSON format)
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// List the active artifact rules
    ListRules {
        /// Emit rules as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let rules = load_rules(cli.rules_file.as_deref())?;
    match cli.command {
        Commands::Readiness { repo, json } => readiness(&repo, &rules, json),
        Commands::Findings { input, json } => findings(&input, json),
        Commands::ListRules { json } => list_rules(&rules, json),
    }
}

fn load_rules(rules_file: Option<&Path>) -> Result<Vec<ArtifactRule>> {
    match rules_file {
        Some(path) => FileRuleSource::new(path)
            .load_rules()
            .with_context(|| format!("failed to load rules from {}", path.display())),
        None => Ok(default_rules()),
    }
}

fn readiness(repo: &Path, rules: &[ArtifactRule], json: bool) -> Result<()> {
    let resolver = SnapshotResolver::new(repo);
    let results = resolver.resolve(rules);
    let report = render_readiness(&results, output_format(json))?;
    print!("{report}");
    Ok(())
}

fn findings(input: &Path, json: bool) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read scanner output at {}", input.display()))?;
    let document: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("scanner output at {} is not JSON", input.display()))?;
    let summary = aggregate(grype::raw_findings_from_document(&document));
    let report = render_findings(&summary, output_format(json))?;
    print!("{report}");
    Ok(())
}

fn list_rules(rules: &[ArtifactRule], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rules)?);
        return Ok(());
    }

    println!("{} rule(s) active", rules.len());
    for rule in rules {
        let alternatives = if rule.alternatives.is_empty() {
            String::new()
        } else {
            format!(" (+{} alternatives)", rule.alternatives.len())
        };
        println!(
            "- {key:<18} weight {weight:>3} :: {primary}{alternatives}",
            key = rule.key,
            weight = rule.weight,
            primary = rule.primary_path,
            alternatives = alternatives
        );
    }
    Ok(())
}

fn output_format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
