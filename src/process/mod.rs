//! Process management subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciler
//!     → ProcessManager::fork()        (start one worker, returns its id)
//!     → ProcessManager::disconnect()  (ask one worker to drain and exit)
//!
//! child.rs (per worker task):
//!     stdout line → protocol.rs → WorkerEvent::Listening
//!     process exit → exit.rs    → WorkerEvent::Exit
//!     → event channel → supervisor loop → Reconciler::handle_event
//! ```
//!
//! # Design Decisions
//! - `fork`/`disconnect` are fire-and-forget; completion is only ever
//!   observed through events
//! - The trait is the seam tests replace with a scripted manager
//! - Nothing from inside a worker propagates as an error; a failing
//!   worker is just an exit event

pub mod child;
pub mod exit;
pub mod protocol;

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::pool::WorkerId;

pub use child::{ChildProcessManager, LaunchSpec};
pub use exit::WorkerExit;
pub use protocol::WorkerMessage;

/// Asynchronous lifecycle events reported by the process manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The worker bound its listener.
    Listening { id: WorkerId, address: SocketAddr },
    /// The worker process is gone.
    Exit { id: WorkerId, exit: WorkerExit },
}

/// A worker the process manager just started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkedWorker {
    pub id: WorkerId,
    pub pid: u32,
}

/// Error type for process manager operations.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to start {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned worker exited before its pid could be read")]
    NoPid,

    #[error("worker {0} is not managed by this supervisor")]
    UnknownWorker(WorkerId),

    #[error("failed to signal worker {id}: {source}")]
    Signal {
        id: WorkerId,
        #[source]
        source: nix::Error,
    },
}

/// Starts and stops worker processes on behalf of the reconciler.
///
/// Implementations must not block and must assign ids in increasing order.
/// Events for forked workers go to the channel handed over at construction.
pub trait ProcessManager: Send + Sync + 'static {
    /// Start one worker.
    fn fork(&self) -> Result<ForkedWorker, SpawnError>;

    /// Tell a worker to stop accepting new work. It exits on its own.
    fn disconnect(&self, id: WorkerId) -> Result<(), SpawnError>;
}
