//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! align(desired?)                     (reconciler.rs)
//!     → state.rs (desired count, pending forks, drain flag)
//!     → delta > 0: throttle.rs slot → ProcessManager::fork → registry insert
//!     → delta < 0: registry.rs pick → ProcessManager::disconnect
//!
//! Process events
//!     → Listening: registry status update
//!     → Exit: registry remove → align() (self-healing)
//! ```
//!
//! # Design Decisions
//! - One `PoolState` behind one lock; all writers go through the reconciler
//!   or the lifecycle orchestrator
//! - The registry is the only notion of "actual count"; nothing polls the OS

pub mod reconciler;
pub mod registry;
pub mod state;
pub mod throttle;
pub mod worker;

pub use reconciler::{AlignOutcome, Reconciler};
pub use registry::WorkerRegistry;
pub use state::{PoolSnapshot, PoolState, SharedState};
pub use throttle::ForkThrottle;
pub use worker::{WorkerHandle, WorkerId, WorkerStatus};
