//! Reconciler: converge the actual worker set toward the desired count.
//!
//! # Responsibilities
//! - `align`: compute delta = target − (live + pending) and issue the
//!   minimal set of staggered forks or disconnects
//! - Apply process events to the registry and self-heal after every exit
//!
//! # Design Decisions
//! - Delta is recomputed from the live registry on every call, so repeated
//!   calls never double-provision
//! - Forks are scheduled on the fork throttle; a crashing worker cannot
//!   cause more than one fork per stagger interval
//! - A scheduled fork re-checks the target when it fires and is dropped
//!   if the pool no longer needs it
//! - Scale-down picks workers in registry order, skipping those already
//!   stopping

use std::sync::Arc;

use tokio::time::Instant;

use crate::observability::metrics;
use crate::pool::state::{PoolState, SharedState};
use crate::pool::worker::{WorkerHandle, WorkerId, WorkerStatus};
use crate::process::{ProcessManager, WorkerEvent, WorkerExit};

/// Actions issued by one `align` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignOutcome {
    /// Forks placed on the throttle.
    pub scheduled: usize,
    /// Workers asked to disconnect.
    pub disconnected: Vec<WorkerId>,
}

impl AlignOutcome {
    pub fn is_noop(&self) -> bool {
        self.scheduled == 0 && self.disconnected.is_empty()
    }
}

#[derive(Clone)]
pub struct Reconciler {
    state: SharedState,
    manager: Arc<dyn ProcessManager>,
    environment: Arc<str>,
}

impl Reconciler {
    pub fn new(state: SharedState, manager: Arc<dyn ProcessManager>, environment: &str) -> Self {
        Self {
            state,
            manager,
            environment: Arc::from(environment),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Converge toward `desired` (stored as the new desired count) or, when
    /// `None`, toward the current desired count.
    pub fn align(&self, desired: Option<usize>) -> AlignOutcome {
        let mut state = self.state.lock();
        if let Some(count) = desired {
            state.desired = count;
        }

        let wanted = state.target();
        let provisioned = state.registry.len() + state.pending_forks;
        let mut outcome = AlignOutcome::default();

        if wanted > provisioned {
            let count = wanted - provisioned;
            let now = Instant::now();
            for _ in 0..count {
                let slot = state.throttle.reserve(now);
                state.pending_forks += 1;
                let reconciler = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep_until(slot).await;
                    reconciler.fire_fork();
                });
            }
            outcome.scheduled = count;
            tracing::debug!(wanted, provisioned, scheduled = count, "Scheduled worker forks");
        } else {
            let active = state.registry.active_ids();
            if active.len() > wanted {
                let excess = active.len() - wanted;
                for id in active.into_iter().take(excess) {
                    self.disconnect_locked(&mut state, id);
                    outcome.disconnected.push(id);
                }
            }
        }

        metrics::record_pool_size(state.desired, state.registry.len());
        outcome
    }

    /// Ask one worker to stop. Returns false if it is not in the registry.
    pub fn disconnect(&self, id: WorkerId) -> bool {
        let mut state = self.state.lock();
        if !state.registry.contains(id) {
            return false;
        }
        self.disconnect_locked(&mut state, id);
        true
    }

    fn disconnect_locked(&self, state: &mut PoolState, id: WorkerId) {
        let first_request = state
            .registry
            .mark_stopping(id)
            .is_some_and(|previous| previous != WorkerStatus::Stopping);
        if first_request {
            tracing::info!(worker_id = %id, "Worker {}: disconnecting", id);
            if let Err(e) = self.manager.disconnect(id) {
                tracing::warn!(worker_id = %id, error = %e, "Failed to disconnect worker");
            }
        }
    }

    /// A throttled fork slot came up.
    fn fire_fork(&self) {
        let mut state = self.state.lock();
        state.pending_forks = state.pending_forks.saturating_sub(1);

        if state.registry.len() >= state.target() {
            tracing::debug!(
                workers = state.registry.len(),
                wanted = state.target(),
                "Scheduled fork no longer needed"
            );
            return;
        }

        match self.manager.fork() {
            Ok(forked) => {
                state
                    .registry
                    .insert(WorkerHandle::starting(forked.id, forked.pid));
                metrics::record_fork(true);
                metrics::record_pool_size(state.desired, state.registry.len());
                tracing::info!(worker_id = %forked.id, pid = forked.pid, "Worker {}: forked", forked.id);
            }
            Err(e) => {
                metrics::record_fork(false);
                tracing::warn!(error = %e, "Failed to fork worker, retrying on next slot");
                drop(state);
                self.align(None);
            }
        }
    }

    /// Apply an event from the process manager.
    pub fn handle_event(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Listening { id, address } => {
                let mut state = self.state.lock();
                match state.registry.mark_listening(id, address) {
                    Some(handle) => tracing::info!(
                        worker_id = %id,
                        environment = %self.environment,
                        address = %address,
                        pid = handle.pid,
                        "Worker {}: Environment: {}. Listening http://{}. PID {}",
                        id,
                        self.environment,
                        address,
                        handle.pid
                    ),
                    None => tracing::debug!(worker_id = %id, "Listening event for unknown worker"),
                }
            }
            WorkerEvent::Exit { id, exit } => {
                let removed = self.state.lock().registry.remove(id);
                metrics::record_exit(exit.cause());
                match removed {
                    Some(handle) => log_exit(&handle, exit),
                    None => tracing::debug!(worker_id = %id, %exit, "Exit event for unknown worker"),
                }
                self.align(None);
            }
        }
    }
}

fn log_exit(handle: &WorkerHandle, exit: WorkerExit) {
    let id = handle.id;
    let uptime_ms = handle.uptime().as_millis() as u64;
    if exit.is_bind_failure() {
        tracing::warn!(worker_id = %id, pid = handle.pid, uptime_ms, "Worker {}: could not bind its listener, {}", id, exit);
    } else if handle.is_stopping() && (exit.is_success() || exit.signal.is_some()) {
        tracing::info!(worker_id = %id, pid = handle.pid, uptime_ms, "Worker {}: {}", id, exit);
    } else {
        tracing::warn!(worker_id = %id, pid = handle.pid, uptime_ms, "Worker {}: {}", id, exit);
    }
}
