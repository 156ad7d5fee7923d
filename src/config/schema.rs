//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the supervisor.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the worker-pool supervisor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Runtime environment tag, used only to annotate log lines.
    pub environment: String,

    /// Where to record the supervisor's pid for `poolctl`.
    pub pid_file: Option<PathBuf>,

    /// Pool sizing and the worker executable.
    pub pool: PoolConfig,

    /// Settings handed to every worker process.
    pub worker: WorkerConfig,

    /// Fork stagger and polling cadence.
    pub timing: TimingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            pid_file: None,
            pool: PoolConfig::default(),
            worker: WorkerConfig::default(),
            timing: TimingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Worker count the pool starts with (and returns to on reset).
    pub fn baseline_workers(&self) -> usize {
        self.pool.workers.unwrap_or_else(default_worker_count)
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Desired number of workers (default: host CPU count).
    pub workers: Option<usize>,

    /// Executable forked for each worker.
    /// Defaults to `static-worker` next to the supervisor binary.
    pub exec: Option<PathBuf>,

    /// Extra arguments for the worker executable.
    pub args: Vec<String>,

    /// Reload the pool one by one when the executable changes on disk.
    pub watch_exec: bool,
}

/// Worker configuration, exported to workers through their environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Address every worker binds (shared with `SO_REUSEPORT`).
    pub bind_address: String,

    /// Directory served by the static worker.
    pub static_dir: PathBuf,

    /// Grace period for in-flight requests after a disconnect.
    pub drain_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            static_dir: PathBuf::from("public"),
            drain_timeout_secs: 10,
        }
    }
}

/// Timing configuration for the reconciler and lifecycle protocols.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum spacing between two forks in milliseconds.
    pub fork_stagger_ms: u64,

    /// Polling interval of shutdown and reload waits in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fork_stagger_ms: 1000,
            poll_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn fork_stagger(&self) -> Duration {
        Duration::from_millis(self.fork_stagger_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_host_cpu_count() {
        let config = SupervisorConfig::default();
        assert!(config.baseline_workers() >= 1);
        assert_eq!(config.timing.fork_stagger(), Duration::from_secs(1));
        assert_eq!(config.timing.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SupervisorConfig = toml::from_str(
            r#"
            environment = "production"

            [pool]
            workers = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, "production");
        assert_eq!(config.baseline_workers(), 3);
        assert_eq!(config.worker.bind_address, "0.0.0.0:3000");
        assert_eq!(config.worker.drain_timeout_secs, 10);
        assert!(!config.pool.watch_exec);
    }
}
