//! OS-backed process manager.
//!
//! # Responsibilities
//! - Spawn the worker executable with its settings in the environment
//! - Watch each child: protocol lines on stdout, exit status on termination
//! - Deliver disconnects (close the control pipe, then SIGTERM)

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;

use crate::config::SupervisorConfig;
use crate::pool::WorkerId;
use crate::process::exit::WorkerExit;
use crate::process::protocol::{self, WorkerMessage};
use crate::process::{ForkedWorker, ProcessManager, SpawnError, WorkerEvent};

/// What to run for every worker.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, OsString)>,
}

impl LaunchSpec {
    /// Build the launch spec from configuration. `program` is the resolved
    /// worker executable.
    pub fn from_config(config: &SupervisorConfig, program: PathBuf) -> Self {
        let env = vec![
            (
                protocol::ENV_ENVIRONMENT.to_string(),
                OsString::from(&config.environment),
            ),
            (
                protocol::ENV_BIND_ADDRESS.to_string(),
                OsString::from(&config.worker.bind_address),
            ),
            (
                protocol::ENV_STATIC_DIR.to_string(),
                config.worker.static_dir.clone().into_os_string(),
            ),
            (
                protocol::ENV_DRAIN_TIMEOUT_SECS.to_string(),
                OsString::from(config.worker.drain_timeout_secs.to_string()),
            ),
            (
                protocol::ENV_LOG_LEVEL.to_string(),
                OsString::from(&config.observability.log_level),
            ),
        ];

        Self {
            program,
            args: config.pool.args.clone(),
            env,
        }
    }
}

/// Bookkeeping for one live child.
#[derive(Debug)]
struct Tracked {
    pid: Pid,
    /// Control pipe; closing it tells the worker the supervisor let go.
    stdin: Option<ChildStdin>,
}

type TrackedMap = Arc<Mutex<HashMap<WorkerId, Tracked>>>;

fn lock(children: &TrackedMap) -> MutexGuard<'_, HashMap<WorkerId, Tracked>> {
    children.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process manager that forks real worker processes.
#[derive(Debug)]
pub struct ChildProcessManager {
    spec: LaunchSpec,
    events: mpsc::UnboundedSender<WorkerEvent>,
    next_id: AtomicU64,
    children: TrackedMap,
}

impl ChildProcessManager {
    pub fn new(spec: LaunchSpec, events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self {
            spec,
            events,
            next_id: AtomicU64::new(1),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of children still being watched.
    pub fn tracked(&self) -> usize {
        lock(&self.children).len()
    }
}

impl ProcessManager for ChildProcessManager {
    fn fork(&self) -> Result<ForkedWorker, SpawnError> {
        let id = WorkerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .envs(self.spec.env.iter().map(|(k, v)| (k, v)))
            .env(protocol::ENV_WORKER_ID, id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            program: self.spec.program.clone(),
            source,
        })?;

        let pid = child.id().ok_or(SpawnError::NoPid)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        // pids always fit: the kernel caps them well below i32::MAX
        lock(&self.children).insert(
            id,
            Tracked {
                pid: Pid::from_raw(pid as i32),
                stdin,
            },
        );

        tokio::spawn(watch_child(
            id,
            child,
            stdout,
            self.events.clone(),
            Arc::clone(&self.children),
        ));

        Ok(ForkedWorker { id, pid })
    }

    fn disconnect(&self, id: WorkerId) -> Result<(), SpawnError> {
        let pid = {
            let mut children = lock(&self.children);
            let tracked = children.get_mut(&id).ok_or(SpawnError::UnknownWorker(id))?;
            tracked.stdin.take();
            tracked.pid
        };

        match kill(pid, Signal::SIGTERM) {
            // already exited; its exit event is on the way
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(SpawnError::Signal { id, source }),
        }
    }
}

/// Follow one child until it exits, translating its output into events.
async fn watch_child(
    id: WorkerId,
    mut child: Child,
    stdout: Option<ChildStdout>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    children: TrackedMap,
) {
    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match WorkerMessage::parse_line(&line) {
                    Some(WorkerMessage::Listening { address }) => {
                        let _ = events.send(WorkerEvent::Listening { id, address });
                    }
                    None => tracing::info!(worker_id = %id, "{}", line),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(worker_id = %id, error = %e, "Failed to read worker output");
                    break;
                }
            }
        }
    }

    let exit = match child.wait().await {
        Ok(status) => WorkerExit::from_status(status),
        Err(e) => {
            tracing::error!(worker_id = %id, error = %e, "Failed to collect worker exit status");
            WorkerExit::unknown()
        }
    };

    lock(&children).remove(&id);
    let _ = events.send(WorkerEvent::Exit { id, exit });
}
