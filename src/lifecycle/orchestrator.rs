//! Multi-step pool protocols: shutdown-and-restart, rolling reload, scaling.
//!
//! Every protocol is a sequence of reconciler calls separated by polling
//! waits. State is re-read from the shared pool on every resumption; nothing
//! observed before a sleep is trusted after it.

use std::collections::VecDeque;
use std::time::Duration;

use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::pool::{AlignOutcome, PoolState, Reconciler, SharedState, WorkerId};

/// How a rolling reload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Every queued worker was replaced.
    Completed,
    /// A newer reload started; it owns the pool from here.
    Superseded,
    /// A shutdown drain started.
    Aborted,
}

impl ReloadOutcome {
    fn as_str(self) -> &'static str {
        match self {
            ReloadOutcome::Completed => "completed",
            ReloadOutcome::Superseded => "superseded",
            ReloadOutcome::Aborted => "aborted",
        }
    }
}

/// How a shutdown request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The pool drained and the supervisor was told to exit.
    Exited,
    /// The pool drained and is refilling to this many workers.
    Restarted(usize),
    /// A drain was already running; its restart target was replaced.
    Merged,
}

#[derive(Clone)]
pub struct Orchestrator {
    reconciler: Reconciler,
    poll_interval: Duration,
    shutdown: Shutdown,
}

impl Orchestrator {
    pub fn new(reconciler: Reconciler, poll_interval: Duration, shutdown: Shutdown) -> Self {
        Self {
            reconciler,
            poll_interval,
            shutdown,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn state(&self) -> &SharedState {
        self.reconciler.state()
    }

    /// Drain every worker, then either exit (`restart_to == 0`) or refill
    /// the pool to `restart_to` workers.
    pub async fn shutdown_and_restart(&self, restart_to: usize) -> ShutdownOutcome {
        let draining = {
            let mut state = self.state().lock();
            let previous = state.drain_target.replace(restart_to);
            if previous.is_none() {
                Some(state.registry.len())
            } else {
                None
            }
        };

        let Some(workers) = draining else {
            tracing::info!(restart_to, "Shutdown already in progress, restart target updated");
            return ShutdownOutcome::Merged;
        };

        tracing::info!(workers, restart_to, "Shutting down {} workers", workers);
        self.reconciler.align(None);

        loop {
            let remaining = self.state().lock().registry.len();
            if remaining == 0 {
                break;
            }
            tracing::info!(remaining, "Waiting for {} workers to exit", remaining);
            tokio::time::sleep(self.poll_interval).await;
        }

        let target = {
            let mut state = self.state().lock();
            let target = state.drain_target.unwrap_or(0);
            if target > 0 {
                state.drain_target = None;
            }
            target
        };

        if target == 0 {
            tracing::info!("All workers stopped, supervisor exiting");
            self.shutdown.trigger();
            return ShutdownOutcome::Exited;
        }

        tracing::info!(workers = target, "All workers stopped, restarting {} workers", target);
        self.reconciler.align(Some(target));
        ShutdownOutcome::Restarted(target)
    }

    /// Replace workers one at a time. With `None`, every worker currently in
    /// the registry is queued in registry order.
    pub async fn reload(&self, ids: Option<Vec<WorkerId>>) -> ReloadOutcome {
        let started = {
            let mut state = self.state().lock();
            if state.is_draining() {
                None
            } else {
                state.reload_generation += 1;
                let queue: VecDeque<WorkerId> = match ids {
                    Some(ids) => ids.into(),
                    None => state.registry.ids().into(),
                };
                Some((state.reload_generation, queue))
            }
        };

        let Some((generation, mut queue)) = started else {
            tracing::info!("Shutdown in progress, reload skipped");
            return finish_reload(ReloadOutcome::Aborted);
        };

        tracing::info!(generation, workers = queue.len(), "Reloading {} workers", queue.len());

        while let Some(id) = queue.pop_front() {
            if let Some(stop) = interruption(&self.state().lock(), generation) {
                return finish_reload(stop);
            }

            tracing::info!(worker_id = %id, remaining = queue.len(), "Reload: replacing worker {}", id);
            if !self.reconciler.disconnect(id) {
                tracing::debug!(worker_id = %id, "Reload: worker already gone");
            }

            if let Some(stop) = self
                .wait_for(generation, |state| !state.registry.contains(id))
                .await
            {
                return finish_reload(stop);
            }
            if let Some(stop) = self.wait_for(generation, replacement_ready).await {
                return finish_reload(stop);
            }
        }

        tracing::info!(generation, "Reload workers complete");
        finish_reload(ReloadOutcome::Completed)
    }

    /// Poll until `ready` holds. Returns the reason to stop if this reload
    /// was superseded or a drain began in the meantime.
    async fn wait_for<F>(&self, generation: u64, ready: F) -> Option<ReloadOutcome>
    where
        F: Fn(&PoolState) -> bool,
    {
        loop {
            {
                let state = self.state().lock();
                if let Some(stop) = interruption(&state, generation) {
                    return Some(stop);
                }
                if ready(&state) {
                    return None;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub fn inc_workers(&self) -> AlignOutcome {
        let desired = {
            let mut state = self.state().lock();
            state.desired += 1;
            state.desired
        };
        tracing::info!(desired, "Increasing workers to {}", desired);
        self.reconciler.align(None)
    }

    pub fn dec_workers(&self) -> AlignOutcome {
        let desired = {
            let mut state = self.state().lock();
            state.desired = state.desired.saturating_sub(1);
            state.desired
        };
        tracing::info!(desired, "Decreasing workers to {}", desired);
        self.reconciler.align(None)
    }

    /// Restore the worker count recorded at startup.
    pub fn reset_workers(&self) -> AlignOutcome {
        let baseline = self.state().lock().baseline;
        tracing::info!(desired = baseline, "Resetting workers to {}", baseline);
        self.reconciler.align(Some(baseline))
    }
}

fn interruption(state: &PoolState, generation: u64) -> Option<ReloadOutcome> {
    if state.is_draining() {
        Some(ReloadOutcome::Aborted)
    } else if state.reload_generation != generation {
        Some(ReloadOutcome::Superseded)
    } else {
        None
    }
}

/// Size is back at the desired count and the newest worker is serving.
fn replacement_ready(state: &PoolState) -> bool {
    state.registry.len() == state.desired
        && state
            .registry
            .newest()
            .map_or(true, |handle| handle.is_listening())
}

fn finish_reload(outcome: ReloadOutcome) -> ReloadOutcome {
    match outcome {
        ReloadOutcome::Completed => {}
        other => tracing::info!(outcome = other.as_str(), "Reload stopped early"),
    }
    metrics::record_reload(outcome.as_str());
    outcome
}
