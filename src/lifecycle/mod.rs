//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM   → Shutdown
//!     SIGTTIN/SIGTTOU  → AddWorker / RemoveWorker
//!     SIGHUP/SIGUSR2   → Reload
//!     SIGWINCH         → ResetWorkers
//!     → action channel → supervisor.rs
//!
//! Supervisor loop (supervisor.rs):
//!     process event   → Reconciler::handle_event
//!     control action  → orchestrator.rs protocol
//!     shutdown fired  → exit
//!
//! Orchestrator (orchestrator.rs):
//!     shutdown_and_restart: drain → empty → refill or exit
//!     reload: disconnect one → gone → replacement listening → next
//! ```
//!
//! # Design Decisions
//! - Protocols poll at a fixed interval with unbounded retries
//! - A repeated trigger never stacks: shutdown merges, reload supersedes
//! - Only shutdown-to-zero ends the process

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use orchestrator::{Orchestrator, ReloadOutcome, ShutdownOutcome};
pub use shutdown::Shutdown;
pub use signals::{ControlAction, SignalDispatcher, SIGNAL_TABLE};
pub use startup::{resolve_worker_exec, PidFile};
pub use supervisor::Supervisor;
