//! Worker handle abstraction.
//!
//! # Responsibilities
//! - Identify a single worker process for its whole lifetime
//! - Track lifecycle status (Starting → Listening, any → Stopping)
//!
//! # Design Decisions
//! - No terminal "dead" state: an exited worker is removed from the registry
//! - Handles are owned by the registry; everything else refers to them by id

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

/// Opaque worker identity assigned by the process manager at fork time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Forked, not yet accepting connections.
    Starting,
    /// Bound its listener and is serving.
    Listening,
    /// Asked to disconnect; draining until it exits.
    Stopping,
}

/// One running worker process.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub pid: u32,
    pub status: WorkerStatus,
    /// Bound address, known once the worker is listening.
    pub address: Option<SocketAddr>,
    pub started_at: Instant,
}

impl WorkerHandle {
    /// A freshly forked worker.
    pub fn starting(id: WorkerId, pid: u32) -> Self {
        Self {
            id,
            pid,
            status: WorkerStatus::Starting,
            address: None,
            started_at: Instant::now(),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.status == WorkerStatus::Stopping
    }

    pub fn is_listening(&self) -> bool {
        self.status == WorkerStatus::Listening
    }

    /// Time since the worker was forked.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
