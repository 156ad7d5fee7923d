//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the worker executable
//! - Write the pid file `poolctl` reads, remove it on exit
//! - Wire the process manager, pool, orchestrator and signal handlers
//! - Provision the initial pool and run the supervisor loop
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Signal handlers are installed before the first fork
//! - The pid file is a guard; dropping it removes the file

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::watcher::ExecWatcher;
use crate::config::{ConfigError, SupervisorConfig};
use crate::lifecycle::orchestrator::Orchestrator;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::SignalDispatcher;
use crate::lifecycle::supervisor::Supervisor;
use crate::observability::metrics;
use crate::pool::{PoolState, Reconciler, SharedState};
use crate::process::{ChildProcessManager, LaunchSpec};

/// Error type for supervisor startup.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to resolve worker executable: {0}")]
    Exec(#[source] io::Error),

    #[error("failed to write pid file {path:?}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    #[error("failed to watch worker executable: {0}")]
    Watcher(#[from] notify::Error),
}

/// Default worker binary, installed next to the supervisor.
pub const DEFAULT_WORKER_BINARY: &str = "static-worker";

/// Pick the executable forked for every worker.
pub fn resolve_worker_exec(configured: Option<&Path>) -> io::Result<PathBuf> {
    match configured {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(std::env::current_exe()?.with_file_name(DEFAULT_WORKER_BINARY)),
    }
}

/// Read a pid written by [`PidFile::create`]. Zero and garbage are `None`.
pub fn read_pid(path: &Path) -> Option<i32> {
    let raw = std::fs::read_to_string(path).ok()?;
    raw.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
}

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id()))?;
        tracing::info!(path = ?path, "PID file written");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = ?self.path, error = %e, "Failed to remove PID file");
        }
    }
}

/// Run the supervisor until a shutdown to zero workers completes.
pub async fn run(config: SupervisorConfig) -> Result<(), SupervisorError> {
    let exec = resolve_worker_exec(config.pool.exec.as_deref()).map_err(SupervisorError::Exec)?;
    let baseline = config.baseline_workers();

    tracing::info!(
        environment = %config.environment,
        workers = baseline,
        exec = ?exec,
        pid = std::process::id(),
        "cluster-supervisor v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let _pid_file = config
        .pid_file
        .as_deref()
        .map(|path| {
            PidFile::create(path).map_err(|source| SupervisorError::PidFile {
                path: path.to_path_buf(),
                source,
            })
        })
        .transpose()?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();

    let manager = Arc::new(ChildProcessManager::new(
        LaunchSpec::from_config(&config, exec.clone()),
        events_tx,
    ));
    let state = SharedState::new(PoolState::new(baseline, config.timing.fork_stagger()));
    let reconciler = Reconciler::new(state, manager, &config.environment);
    let shutdown = Shutdown::new();
    let orchestrator = Orchestrator::new(
        reconciler.clone(),
        config.timing.poll_interval(),
        shutdown.clone(),
    );

    let signals = SignalDispatcher::install(actions_tx.clone()).map_err(SupervisorError::Signals)?;
    let _watcher = if config.pool.watch_exec {
        Some(ExecWatcher::new(&exec, actions_tx.clone()).run()?)
    } else {
        None
    };

    let supervisor = Supervisor::new(orchestrator, events_rx, actions_rx, shutdown.subscribe());
    reconciler.align(None);
    supervisor.run().await;

    signals.uninstall();
    tracing::info!("Shutdown complete");
    Ok(())
}
