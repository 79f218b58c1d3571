mod config;
mod extract;
mod github;
mod logline;
mod process;
mod reassemble;
mod record;
mod report;

use clap::Parser;
use config::MetricsConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// A Rust CLI tool that extracts AI code-review metrics (cost, duration,
/// turns, PR metadata) from GitHub Actions workflow logs and emits CSV/JSON
/// reports.
#[derive(Parser, Debug)]
#[command(name = "review-metrics", version, about)]
pub struct Cli {
    /// Repository in owner/repo format (overrides config)
    #[arg(short, long)]
    repo: Option<String>,

    /// Workflow name to query (overrides config)
    #[arg(short, long)]
    workflow: Option<String>,

    /// Number of days to look back (overrides config)
    #[arg(short, long)]
    days: Option<i64>,

    /// Maximum number of runs to fetch (overrides config)
    #[arg(short, long)]
    limit: Option<u32>,

    /// Parallel log fetches (overrides config)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Config file path
    #[arg(short, long, default_value = "review-metrics.toml")]
    config: PathBuf,

    /// CSV output file path (overrides config)
    #[arg(long)]
    csv_output: Option<PathBuf>,

    /// JSON output file path (overrides config)
    #[arg(long)]
    json_output: Option<PathBuf>,

    /// Skip CSV report generation
    #[arg(long)]
    no_csv: bool,

    /// Skip JSON output
    #[arg(long)]
    no_json: bool,

    /// Extra logging (per-run extraction detail)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match MetricsConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "could not load config");
            return ExitCode::FAILURE;
        }
    };

    // CLI flags override config values.
    if let Some(repo) = cli.repo {
        config.github.repo = repo;
    }
    if let Some(workflow) = cli.workflow {
        config.github.workflow = workflow;
    }
    if let Some(days) = cli.days {
        config.github.days = days;
    }
    if let Some(limit) = cli.limit {
        config.github.limit = limit;
    }
    if let Some(jobs) = cli.jobs {
        config.process.parallelism = jobs;
    }
    if let Some(path) = cli.csv_output {
        config.output.csv_path = path;
    }
    if let Some(path) = cli.json_output {
        config.output.json_path = path;
    }

    if config.github.repo.is_empty() {
        tracing::error!("no repository specified (use --repo or set github.repo in the config)");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        workflow = %config.github.workflow,
        repo = %config.github.repo,
        days = config.github.days,
        "fetching workflow runs"
    );

    let runs = match github::list_runs(
        &config.github.workflow,
        config.github.limit,
        config.github.days,
        &config.github.repo,
    )
    .await
    {
        Ok(runs) => runs,
        Err(e) => {
            tracing::error!(error = %e, "error getting run list");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        count = runs.len(),
        days = config.github.days,
        "found runs in window"
    );

    let records =
        process::process_runs(runs, &config.github.repo, config.process.parallelism).await;

    if !cli.no_csv {
        if let Err(e) = report::write_csv(&records, &config.output.csv_path, &config.github.repo) {
            tracing::error!(error = %e, "CSV report failed");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %config.output.csv_path.display(), "CSV report generated");
    }

    if !cli.no_json {
        if let Err(e) = report::write_json(&records, &config.output.json_path) {
            tracing::error!(error = %e, "JSON output failed");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %config.output.json_path.display(), "JSON output saved");
    }

    ExitCode::SUCCESS
}
