//! Activity importer command-line entry point.
//!
//! Runs one import: reads settings and credentials, mirrors new GitLab (and
//! optionally Codeberg) commits into the local repository, and pushes them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use activity_importer_core::config::{expand_tilde, ImporterSection};
use activity_importer_core::models::{RunOutcome, RunReport};
use activity_importer_core::{
    CodebergClient, GitLabClient, ImportRun, ImporterConfig, LocalMirror,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Mirror GitLab and Codeberg commit activity into a git repository.
#[derive(Parser, Debug)]
#[command(name = "activity-importer", version, about)]
struct Cli {
    /// Optional TOML settings file with an `[importer]` table.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides the config file).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Mirror repository directory (overrides the config file).
    #[arg(long)]
    repo_dir: Option<PathBuf>,

    /// Print a default settings file and exit.
    #[arg(long)]
    print_config: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", ImporterConfig::default_template());
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli_level: Option<&str>, settings: &ImporterSection) {
    let level = cli_level.unwrap_or(&settings.log_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = ImporterSection::load_or_default(cli.config.as_deref())
        .context("failed to load configuration file")?;
    init_tracing(cli.log_level.as_deref(), &settings);

    let mut config =
        ImporterConfig::from_env(settings).context("failed to resolve configuration")?;
    if let Some(dir) = &cli.repo_dir {
        config.mirror.repo_dir = expand_tilde(dir);
    }
    info!(
        repo_dir = %config.mirror.repo_dir.display(),
        branch = %config.mirror.branch,
        codeberg = config.is_secondary_enabled(),
        "configuration loaded"
    );

    let timeout = Duration::from_secs(config.settings.request_timeout_secs);
    let gitlab = Arc::new(
        GitLabClient::from_config(&config.primary, timeout)
            .context("failed to create GitLab client")?,
    );
    let codeberg = match &config.secondary {
        Some(source) => Some(Arc::new(
            CodebergClient::from_config(source, timeout)
                .context("failed to create Codeberg client")?,
        )),
        None => None,
    };

    let mirror = LocalMirror::new(config.mirror.clone());
    let mut run = ImportRun::new(config, gitlab.clone(), gitlab, mirror);
    if let Some(codeberg) = codeberg {
        run = run.with_secondary(codeberg);
    }

    let report = run.run().await.context("import run failed")?;
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    match report.outcome {
        RunOutcome::NoContributions => info!("no contributions found, nothing to import"),
        RunOutcome::NoNewCommits => info!("no new commits to import"),
        RunOutcome::Pushed { commits } => info!(commits, "imported and pushed new commits"),
    }
    info!("operation took {:.2?} in total", report.elapsed);

    let secondary = report
        .fetch
        .secondary
        .as_ref()
        .map_or_else(|| "disabled".to_string(), |s| format!("{} batches", s.batches));
    println!(
        "gitlab: {} batches ({} failed), codeberg: {}, commits created: {}, took {:.2?}",
        report.fetch.primary.batches,
        report.fetch.primary.failed,
        secondary,
        report.import.commits_created,
        report.elapsed,
    );
}
