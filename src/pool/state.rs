//! Shared pool state.
//!
//! One `PoolState` per supervisor, shared by the reconciler and the lifecycle
//! orchestrator through a cloned `SharedState`. The lock is only ever held
//! for synchronous sections; it is never held across an `.await`, so every
//! protocol re-reads the state when it resumes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::pool::registry::WorkerRegistry;
use crate::pool::throttle::ForkThrottle;
use crate::pool::worker::{WorkerId, WorkerStatus};

#[derive(Debug)]
pub struct PoolState {
    /// Worker count the reconciler converges toward.
    pub desired: usize,
    /// Worker count recorded at startup, restored by reset.
    pub baseline: usize,
    pub registry: WorkerRegistry,
    /// Forks scheduled on the throttle that have not fired yet.
    pub(crate) pending_forks: usize,
    /// Restart target of an in-flight shutdown drain.
    pub(crate) drain_target: Option<usize>,
    pub(crate) reload_generation: u64,
    pub(crate) throttle: ForkThrottle,
}

impl PoolState {
    pub fn new(baseline: usize, fork_stagger: Duration) -> Self {
        Self {
            desired: baseline,
            baseline,
            registry: WorkerRegistry::new(),
            pending_forks: 0,
            drain_target: None,
            reload_generation: 0,
            throttle: ForkThrottle::new(fork_stagger),
        }
    }

    /// Count the reconciler aims for right now: zero while draining.
    pub fn target(&self) -> usize {
        if self.drain_target.is_some() {
            0
        } else {
            self.desired
        }
    }

    pub fn is_draining(&self) -> bool {
        self.drain_target.is_some()
    }

    pub fn pending_forks(&self) -> usize {
        self.pending_forks
    }
}

/// Point-in-time copy of the pool, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub desired: usize,
    pub pending_forks: usize,
    pub draining: bool,
    pub workers: Vec<(WorkerId, WorkerStatus)>,
}

impl PoolSnapshot {
    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|(id, _)| *id).collect()
    }

    pub fn all_listening(&self) -> bool {
        self.workers
            .iter()
            .all(|(_, status)| *status == WorkerStatus::Listening)
    }
}

/// Cloneable handle to the single pool state.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<PoolState>>);

impl SharedState {
    pub fn new(state: PoolState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock the state. A poisoned lock is recovered: every mutation leaves
    /// the state consistent before it can panic.
    pub fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.lock();
        PoolSnapshot {
            desired: state.desired,
            pending_forks: state.pending_forks,
            draining: state.is_draining(),
            workers: state
                .registry
                .iter()
                .map(|handle| (handle.id, handle.status))
                .collect(),
        }
    }
}
