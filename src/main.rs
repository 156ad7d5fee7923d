//! cluster-supervisor
//!
//! Keeps a pool of identical worker processes alive on one host and drives
//! pool changes from POSIX signals.
//!
//! # Architecture Overview
//!
//! ```text
//!   signals ──▶ SignalDispatcher ──▶ ControlAction ──┐
//!   exec watcher ────────────────────────────────────┤
//!                                                    ▼
//!                                  ┌─────────────────────────────┐
//!                                  │         Supervisor          │
//!                                  │  select! events / actions   │
//!                                  └──────┬───────────────┬──────┘
//!                                         │               │
//!                                         ▼               ▼
//!                                   Orchestrator ───▶ Reconciler ───▶ ProcessManager
//!                                 (shutdown, reload,   (align,          (fork,
//!                                  scale, reset)        self-heal)       disconnect)
//!                                                          ▲                 │
//!                                                          │   WorkerEvent   │
//!                                                          └─────────────────┘
//!                                                          listening / exit
//! ```

use std::path::PathBuf;

use clap::Parser;

use cluster_supervisor::config::validation::validate_config;
use cluster_supervisor::config::{load_config, ConfigError, SupervisorConfig};
use cluster_supervisor::lifecycle::startup::{self, SupervisorError};
use cluster_supervisor::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "cluster-supervisor")]
#[command(about = "Single-host worker pool supervisor", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "POOL_CONFIG")]
    config: Option<PathBuf>,

    /// Number of workers (default: CPU count)
    #[arg(short, long, env = "NUM_WORKERS")]
    workers: Option<usize>,

    /// Worker executable
    #[arg(long, env = "POOL_EXEC")]
    exec: Option<PathBuf>,

    /// Environment tag shown in worker log lines
    #[arg(long, env = "APP_ENV")]
    environment: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut SupervisorConfig) {
        if let Some(workers) = self.workers {
            config.pool.workers = Some(workers);
        }
        if let Some(exec) = &self.exec {
            config.pool.exec = Some(exec.clone());
        }
        if let Some(environment) = &self.environment {
            config.environment = environment.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }
}

fn configure(cli: &Cli) -> Result<SupervisorConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SupervisorConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = configure(&cli).map_err(SupervisorError::from)?;

    init_logging(
        &config.observability.log_level,
        config.observability.json_logs,
    )
    .map_err(SupervisorError::from)?;

    startup::run(config).await?;
    Ok(())
}
