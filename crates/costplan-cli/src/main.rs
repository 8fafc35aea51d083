//! costplan: run one Active-Active cost optimization pass and record the
//! results in the local SQLite database.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use costplan_core::config::hours_to_duration;
use costplan_core::{RunStatus, Settings};
use costplan_remote::{HttpClusterApi, RemoteClient};
use costplan_runtime::{RunOptions, RunOrchestrator};
use costplan_store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "costplan")]
#[command(version, about = "Compare Active-Active groups against their optimal plans", long_about = None)]
struct Args {
    /// Process only the first N groups (0 processes all)
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, value_enum, ignore_case = true, default_value = "INFO")]
    log_level: LogLevel,

    /// Reference stored with the run
    #[arg(long)]
    ticket: Option<String>,

    /// Result database, overrides DB_PATH
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Mark in-progress runs older than this many hours as failed first
    #[arg(long)]
    stale_run_hours: Option<u64>,
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive())),
        )
        .init();
}

/// Apply command-line overrides on top of the environment settings.
fn apply_args(mut settings: Settings, args: &Args) -> costplan_core::Result<Settings> {
    if let Some(path) = &args.db_path {
        settings = settings.with_db_path(path);
    }
    if let Some(hours) = args.stale_run_hours {
        settings.stale_run_after = Some(hours_to_duration(hours)?);
    }
    Ok(settings)
}

fn run_options(settings: &Settings, args: &Args) -> RunOptions {
    RunOptions {
        limit: args.limit,
        ticket: args.ticket.clone(),
        ..RunOptions::from_settings(settings)
    }
}

async fn run(args: Args) -> anyhow::Result<RunStatus> {
    let settings = apply_args(Settings::from_env()?, &args)?;
    info!("Result database: {}", settings.db_path.display());

    let store = ResultStore::open(&settings.db_path)
        .with_context(|| format!("Failed to open store at {}", settings.db_path.display()))?;
    let api = HttpClusterApi::new(&settings.remote)?;
    let client = RemoteClient::from_settings(api, &settings.remote)?;
    info!(
        "Planning service {} at {} call(s)/s",
        settings.remote.server, settings.remote.calls_per_second
    );

    let orchestrator = RunOrchestrator::new(client, store);
    let summary = orchestrator.run(&run_options(&settings, &args)).await?;
    Ok(summary.status)
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(status) => {
            error!("Run ended with status {}", status);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
