//! Shared utilities for pool integration tests.
//!
//! `FakeManager` stands in for real processes: every fork "listens" after
//! `LISTEN_DELAY`, every disconnect "exits" cleanly after `DRAIN_DELAY`.
//! Tests run with paused time, so these delays are exact.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use cluster_supervisor::lifecycle::{ControlAction, Orchestrator, Shutdown, Supervisor};
use cluster_supervisor::pool::{PoolState, Reconciler, SharedState, WorkerId};
use cluster_supervisor::process::{ForkedWorker, ProcessManager, SpawnError, WorkerEvent, WorkerExit};

pub const STAGGER: Duration = Duration::from_secs(1);
pub const POLL: Duration = Duration::from_secs(1);
pub const LISTEN_DELAY: Duration = Duration::from_millis(500);
pub const DRAIN_DELAY: Duration = Duration::from_millis(200);
pub const CRASH_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Fork { id: WorkerId, at: Duration },
    FailedFork { at: Duration },
    Disconnect { id: WorkerId, at: Duration },
}

/// Scripted process manager.
pub struct FakeManager {
    events: mpsc::UnboundedSender<WorkerEvent>,
    origin: Instant,
    next_id: AtomicU64,
    crash_on_start: AtomicBool,
    failing_forks: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl FakeManager {
    pub fn new(events: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self {
            events,
            origin: Instant::now(),
            next_id: AtomicU64::new(1),
            crash_on_start: AtomicBool::new(false),
            failing_forks: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every worker forked from now on exits with code 1 right after starting.
    pub fn crash_on_start(&self, crash: bool) {
        self.crash_on_start.store(crash, Ordering::SeqCst);
    }

    /// The next `count` forks fail.
    pub fn fail_next_forks(&self, count: usize) {
        self.failing_forks.store(count, Ordering::SeqCst);
    }

    /// Simulate an unrequested worker death.
    pub fn crash(&self, id: WorkerId) {
        let _ = self.events.send(WorkerEvent::Exit {
            id,
            exit: WorkerExit::code(1),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Offsets from test start of successful forks.
    pub fn fork_times(&self) -> Vec<Duration> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Fork { at, .. } => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn fork_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Fork { .. } | Call::FailedFork { .. }))
            .count()
    }

    pub fn disconnected(&self) -> Vec<WorkerId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Disconnect { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    fn elapsed(&self) -> Duration {
        Instant::now() - self.origin
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProcessManager for FakeManager {
    fn fork(&self) -> Result<ForkedWorker, SpawnError> {
        let failing = self
            .failing_forks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            self.record(Call::FailedFork { at: self.elapsed() });
            return Err(SpawnError::NoPid);
        }

        let id = WorkerId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.record(Call::Fork {
            id,
            at: self.elapsed(),
        });

        let events = self.events.clone();
        if self.crash_on_start.load(Ordering::SeqCst) {
            tokio::spawn(async move {
                tokio::time::sleep(CRASH_DELAY).await;
                let _ = events.send(WorkerEvent::Exit {
                    id,
                    exit: WorkerExit::code(1),
                });
            });
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(LISTEN_DELAY).await;
                let address: SocketAddr = "127.0.0.1:3000".parse().unwrap();
                let _ = events.send(WorkerEvent::Listening { id, address });
            });
        }

        Ok(ForkedWorker {
            id,
            pid: 1000 + id.as_u64() as u32,
        })
    }

    fn disconnect(&self, id: WorkerId) -> Result<(), SpawnError> {
        self.record(Call::Disconnect {
            id,
            at: self.elapsed(),
        });

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(DRAIN_DELAY).await;
            let _ = events.send(WorkerEvent::Exit {
                id,
                exit: WorkerExit::code(0),
            });
        });
        Ok(())
    }
}

/// A running supervisor loop over a `FakeManager`.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub manager: Arc<FakeManager>,
    pub actions: mpsc::UnboundedSender<ControlAction>,
    pub shutdown: Shutdown,
    pub supervisor: JoinHandle<()>,
}

impl Harness {
    /// Start a supervisor with `desired` workers and provision the pool.
    pub fn start(desired: usize) -> Self {
        let harness = Self::idle(desired);
        harness.orchestrator.reconciler().align(None);
        harness
    }

    /// Start a supervisor without the initial align.
    pub fn idle(desired: usize) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();

        let manager = Arc::new(FakeManager::new(events_tx));
        let state = SharedState::new(PoolState::new(desired, STAGGER));
        let reconciler = Reconciler::new(state, manager.clone(), "test");
        let shutdown = Shutdown::new();
        let orchestrator = Orchestrator::new(reconciler, POLL, shutdown.clone());

        let supervisor = Supervisor::new(
            orchestrator.clone(),
            events_rx,
            actions_rx,
            shutdown.subscribe(),
        );
        let supervisor = tokio::spawn(supervisor.run());

        Self {
            orchestrator,
            manager,
            actions: actions_tx,
            shutdown,
            supervisor,
        }
    }

    pub fn send(&self, action: ControlAction) {
        self.actions.send(action).unwrap();
    }

    pub fn state(&self) -> &SharedState {
        self.orchestrator.state()
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.state().snapshot().ids()
    }

    pub fn size(&self) -> usize {
        self.state().lock().registry.len()
    }

    pub fn desired(&self) -> usize {
        self.state().lock().desired
    }

    /// Registry has exactly `count` workers and all of them are listening.
    pub fn settled_at(&self, count: usize) -> bool {
        let snapshot = self.state().snapshot();
        snapshot.workers.len() == count && snapshot.all_listening()
    }

    /// Advance time until the pool settles at `count`, or panic.
    pub async fn settle(&self, count: usize, within: Duration) {
        let deadline = Instant::now() + within;
        while !self.settled_at(count) {
            assert!(
                Instant::now() < deadline,
                "pool did not settle at {count} workers: {:?}",
                self.state().snapshot()
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

pub fn ids(raw: &[u64]) -> Vec<WorkerId> {
    raw.iter().copied().map(WorkerId::new).collect()
}
