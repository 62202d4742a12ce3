//! # Vessel Replay CLI
//!
//! Replays a vessel movement dataset against the wall clock into an in-process
//! twin directory, then waits for every scheduled event to fire.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use vessel_replay::clock::{Clock, MonotonicClock};
use vessel_replay::config::ConfigManager;
use vessel_replay::credentials::{CredentialGate, CredentialRefresher, LocalTokenProvider};
use vessel_replay::dataset::MovementDataset;
use vessel_replay::directory::{DirectoryService, InMemoryDirectory};
use vessel_replay::logging::init_structured_logging;
use vessel_replay::orchestration::ReplayOrchestrator;
use vessel_replay::resilience::{RetryExecutor, RetryPolicy};

#[derive(Parser)]
#[command(name = "vessel-replay")]
#[command(about = "Replay port vessel movements into a digital twin directory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/vessel-replay.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay to apply (development, test, production, ...)
    #[arg(short, long)]
    environment: Option<String>,

    /// Skip records whose shifted arrival is older than the past window
    #[arg(long, conflicts_with = "include_past_data")]
    skip_past_data: bool,

    /// Replay every record, however old
    #[arg(long)]
    include_past_data: bool,

    /// Keep twins left over from a previous run
    #[arg(long)]
    no_clear: bool,

    /// Verbose output (sets RUST_LOG=debug unless already set)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn skip_past_data(&self, configured: bool) -> bool {
        if self.skip_past_data {
            true
        } else if self.include_past_data {
            false
        } else {
            configured
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    init_structured_logging();

    let manager = ConfigManager::load(cli.config.as_deref(), cli.environment.as_deref())
        .context("loading configuration")?;
    let config = manager.config();

    let dataset =
        Arc::new(MovementDataset::load(&config.dataset).context("loading movement dataset")?);

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::from_system());
    let directory: Arc<dyn DirectoryService> = Arc::new(InMemoryDirectory::with_history_limit(
        config.directory.operation_history,
    ));
    let gate = CredentialGate::new();
    let policy = RetryPolicy::from(&config.retry);

    let refresher = CredentialRefresher::new(
        config.credentials.clone(),
        policy.clone(),
        Arc::new(LocalTokenProvider::new(config.credentials.token_duration())),
        Arc::clone(&directory),
        gate.clone(),
    );
    refresher.start()?;

    let orchestrator = ReplayOrchestrator::new(
        config,
        dataset,
        directory,
        RetryExecutor::new(policy, gate),
        clock,
    );

    if config.replay.clear_on_start && !cli.no_clear {
        orchestrator.clear_space().await?;
    }

    let summary = orchestrator
        .start(cli.skip_past_data(config.replay.skip_past_data))
        .await?;
    info!(
        records_seen = summary.records_seen,
        skipped_stale = summary.records_skipped_stale,
        skipped_malformed = summary.records_skipped_malformed,
        twins_created = summary.twins_created,
        twins_updated = summary.twins_updated,
        "Replay loop finished, waiting for pending events"
    );

    tokio::select! {
        _ = orchestrator.scheduler().wait_until_idle() => {
            info!(stats = ?orchestrator.scheduler().stats(), "All scheduled events fired");
        }
        _ = tokio::signal::ctrl_c() => {
            let aborted = orchestrator.shutdown();
            info!(aborted, "Interrupted, pending events dropped");
        }
    }

    refresher.stop();
    Ok(())
}
