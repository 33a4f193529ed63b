use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};

use attest::capability::{Capabilities, load_capabilities};
use attest::checks::{CheckOptions, E2eMode, TestMode};
use attest::config::VerifierConfig;
use attest::feature::load_feature;
use attest::orchestrator::{AiFlavor, VerificationOrchestrator, VerifyOptions};
use attest::result::Verdict;
use attest::store::{MigrationOutcome, ResultStore};

#[derive(Parser)]
#[command(name = "attest")]
#[command(version, about = "Feature verification orchestrator: run checks, ask agents, record verdicts")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify one feature against its acceptance criteria
    Verify {
        /// Feature id to verify
        feature_id: String,

        /// Path to the features JSON file, relative to the project root
        #[arg(long, default_value = "ai/features.json")]
        features_file: PathBuf,

        /// Path to the capabilities JSON file, relative to the project root
        #[arg(long, default_value = "ai/capabilities.json")]
        capabilities_file: PathBuf,

        /// AI analysis style (ignored when the feature requires TDD)
        #[arg(long, value_enum, default_value_t = AiFlavor::Diff)]
        mode: AiFlavor,

        /// Skip automated checks entirely
        #[arg(long)]
        skip_checks: bool,

        /// How the unit-test check should run
        #[arg(long, value_enum, default_value_t = TestMode::Full)]
        test_mode: TestMode,

        /// Selective test command used by quick test mode
        #[arg(long)]
        quick_test_command: Option<String>,

        /// Skip the E2E check
        #[arg(long)]
        skip_e2e: bool,

        /// E2E scenario selection
        #[arg(long, value_enum, default_value_t = E2eMode::Full)]
        e2e_mode: E2eMode,

        /// Fan out non-E2E checks concurrently
        #[arg(long)]
        parallel: bool,
    },
    /// Print all recorded runs for a feature
    History { feature_id: String },
    /// Print the aggregate summary for a feature
    Summary { feature_id: String },
    /// Print the aggregate index across all features
    Index,
    /// Migrate a legacy results.json store, if present
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Verify {
            feature_id,
            features_file,
            capabilities_file,
            mode,
            skip_checks,
            test_mode,
            quick_test_command,
            skip_e2e,
            e2e_mode,
            parallel,
        } => {
            let config = VerifierConfig::new(project_dir, cli.verbose)?;
            let feature = load_feature(&config.project_dir.join(features_file), feature_id)?;
            let capabilities = load_capabilities_or_default(
                &config.project_dir.join(capabilities_file),
                cli.verbose,
            );

            let options = VerifyOptions {
                flavor: *mode,
                skip_checks: *skip_checks,
                checks: CheckOptions {
                    test_mode: *test_mode,
                    selective_test_command: quick_test_command.clone(),
                    skip_e2e: *skip_e2e,
                    e2e_mode: *e2e_mode,
                    e2e_tags: feature.e2e_tags.clone(),
                    parallel: *parallel,
                },
            };

            let orchestrator = VerificationOrchestrator::new(config);
            let record = orchestrator.verify(&feature, &capabilities, &options).await?;

            println!();
            println!(
                "{} run {:03} for {}: {}",
                style("Recorded").bold(),
                record.run_number,
                style(&record.result.feature_id).cyan(),
                styled_verdict(record.result.verdict),
            );
            println!("  verified by: {}", record.result.verified_by);
            if !record.result.overall_reasoning.is_empty() {
                println!("  {}", record.result.overall_reasoning);
            }
            if record.result.verdict == Verdict::Fail {
                std::process::exit(1);
            }
        }
        Commands::History { feature_id } => {
            let store = ResultStore::new(&project_dir);
            let history = store.get_history(feature_id)?;
            if history.is_empty() {
                println!("No recorded runs for {feature_id}");
                return Ok(());
            }
            for record in history {
                println!(
                    "{:03}  {}  {}  ({})",
                    record.run_number,
                    record.result.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    styled_verdict(record.result.verdict),
                    record.result.verified_by,
                );
            }
        }
        Commands::Summary { feature_id } => {
            let store = ResultStore::new(&project_dir);
            match store.get_summary(feature_id)? {
                Some(entry) => {
                    println!("{}", style(&entry.feature_id).cyan().bold());
                    println!(
                        "  latest: run {:03}, {} at {}",
                        entry.latest_run,
                        styled_verdict(entry.latest_verdict),
                        entry.latest_timestamp.format("%Y-%m-%d %H:%M:%S"),
                    );
                    println!(
                        "  totals: {} runs, {} pass, {} fail",
                        entry.total_runs, entry.pass_count, entry.fail_count
                    );
                }
                None => println!("No recorded runs for {feature_id}"),
            }
        }
        Commands::Index => {
            let store = ResultStore::new(&project_dir);
            let index = store.load_index()?;
            if index.features.is_empty() {
                println!("No recorded runs");
                return Ok(());
            }
            for (id, entry) in &index.features {
                println!(
                    "{}  latest {:03} {}  ({} runs: {} pass / {} fail)",
                    style(id).cyan(),
                    entry.latest_run,
                    styled_verdict(entry.latest_verdict),
                    entry.total_runs,
                    entry.pass_count,
                    entry.fail_count,
                );
            }
        }
        Commands::Migrate => {
            let store = ResultStore::new(&project_dir);
            match store.migrate_if_needed()? {
                MigrationOutcome::NotNeeded => println!("Nothing to migrate"),
                MigrationOutcome::Migrated(count) => {
                    println!("Migrated {count} features from results.json")
                }
            }
        }
    }

    Ok(())
}

/// A missing capabilities file means no automated checks, not an error;
/// projects without detection tooling still get AI verification.
fn load_capabilities_or_default(path: &Path, verbose: bool) -> Capabilities {
    if !path.exists() {
        if verbose {
            eprintln!("No capabilities file at {}, skipping checks", path.display());
        }
        return Capabilities::default();
    }
    match load_capabilities(path) {
        Ok(capabilities) => capabilities,
        Err(e) => {
            tracing::warn!(error = %e, "capabilities file unreadable, treating as empty");
            Capabilities::default()
        }
    }
}

fn styled_verdict(verdict: Verdict) -> console::StyledObject<&'static str> {
    match verdict {
        Verdict::Pass => style("pass").green().bold(),
        Verdict::Fail => style("fail").red().bold(),
        Verdict::NeedsReview => style("needs_review").yellow().bold(),
    }
}
