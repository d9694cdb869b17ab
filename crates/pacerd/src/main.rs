//! pacerd — the gridpacer daemon.
//!
//! Periodically snapshots the cluster master, runs every job through the
//! capacity policy engine, and applies the resulting kills and capacity
//! changes. State between cycles (stall counters, restore points, VIP
//! grants) lives in an embedded redb ledger.
//!
//! # Usage
//!
//! ```text
//! pacerd cycle --config /etc/gridpacer/pacerd.toml
//! pacerd run --config /etc/gridpacer/pacerd.toml --interval 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use gridpacer_cluster::HttpClusterApi;
use gridpacer_core::PacerConfig;
use gridpacer_ledger::LedgerStore;
use pacerd::CycleDriver;

#[derive(Parser)]
#[command(name = "pacerd", about = "Gridpacer capacity governor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run exactly one control cycle and exit (cron-friendly).
    Cycle {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: PathBuf,
    },

    /// Run control cycles on a fixed interval until interrupted.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Seconds between cycles.
        #[arg(long, default_value = "60")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pacerd=debug,gridpacer=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Cycle { config } => {
            let driver = build_driver(&config)?;
            driver.run_cycle().await?;
            Ok(())
        }
        Command::Run { config, interval } => run_loop(&config, interval).await,
    }
}

fn build_driver(config: &Path) -> anyhow::Result<CycleDriver<HttpClusterApi>> {
    let cfg = PacerConfig::from_file(config)?;

    if let Some(dir) = cfg.ledger.db_path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let ledger = LedgerStore::open(&cfg.ledger.db_path)?;

    let api = HttpClusterApi::new(
        cfg.cluster.master.clone(),
        Duration::from_secs(cfg.cluster.request_timeout_secs),
    );

    Ok(CycleDriver::new(api, ledger, cfg))
}

async fn run_loop(config: &Path, interval_secs: u64) -> anyhow::Result<()> {
    let driver = build_driver(config)?;
    let interval = Duration::from_secs(interval_secs);
    info!(interval_secs, "pacerd started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                // A failed cycle applies nothing; the next one starts
                // from a fresh snapshot.
                if let Err(e) = driver.run_cycle().await {
                    error!(error = %e, "cycle failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}
