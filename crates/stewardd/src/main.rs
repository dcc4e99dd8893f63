//! stewardd — the Steward daemon.
//!
//! Assembles the control loop against a set of collaborators and runs
//! it until shutdown:
//! - Decision ledger (redb)
//! - Analyzer / engine / executor, wired through the controller
//! - Event logging from the notification bus
//!
//! # Usage
//!
//! ```text
//! stewardd standalone --data-dir /var/lib/steward --config steward.toml
//! ```
//!
//! Standalone mode runs against the built-in simulated cluster; wiring
//! real providers means implementing the collaborator traits and
//! swapping them in here.

mod sim;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use steward_controller::Controller;
use steward_core::ControlConfig;
use steward_ledger::DecisionLedger;

#[derive(Parser)]
#[command(name = "stewardd", about = "Steward optimization daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the loop in one process against the simulated cluster.
    Standalone {
        /// Data directory for the decision ledger.
        #[arg(long, default_value = "/var/lib/steward")]
        data_dir: PathBuf,

        /// TOML config file; absent keys fall back to defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the cycle interval in seconds.
        #[arg(long)]
        cycle_interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stewardd=debug,steward=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            data_dir,
            config,
            cycle_interval,
        } => run_standalone(data_dir, config, cycle_interval).await,
    }
}

async fn run_standalone(
    data_dir: PathBuf,
    config_path: Option<PathBuf>,
    cycle_interval: Option<u64>,
) -> anyhow::Result<()> {
    info!("Steward daemon starting in standalone mode");

    let mut config = match &config_path {
        Some(path) => {
            let doc = std::fs::read_to_string(path)?;
            let config = ControlConfig::from_toml(&doc)?;
            info!(path = ?path, "config loaded");
            config
        }
        None => ControlConfig::default(),
    };
    if let Some(secs) = cycle_interval {
        config.cycle_interval_secs = secs;
    }

    std::fs::create_dir_all(&data_dir)?;
    let ledger_path = data_dir.join("steward.redb");
    let ledger = DecisionLedger::open(
        &ledger_path,
        config.ledger_capacity,
        config.snapshot_capacity,
    )?;
    info!(path = ?ledger_path, "decision ledger opened");

    let cluster = Arc::new(sim::SimCluster::over_provisioned());
    info!("simulated cluster initialized");

    let controller = Arc::new(
        Controller::builder()
            .metrics(cluster.clone())
            .topology(cluster.clone())
            .mutator(cluster.clone())
            .budget(cluster)
            .ledger(ledger)
            .config(config)
            .build()?,
    );

    // ── Background tasks ───────────────────────────────────────

    // Event log: every bus notification becomes a log line.
    let mut events = controller.subscribe();
    let event_handle = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(topic = event.topic(), "event");
        }
    });

    let handle = controller.start();

    // ── Graceful shutdown on Ctrl-C ────────────────────────────

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.stop().await;
    event_handle.abort();

    let stats = controller.statistics()?;
    info!(
        decisions = stats.total,
        executed = stats.executed,
        rolled_back = stats.rolled_back,
        "Steward daemon stopped"
    );
    Ok(())
}
