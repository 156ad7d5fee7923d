//! Single-host worker pool supervisor.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod process;
pub mod worker;

pub use config::schema::SupervisorConfig;
pub use lifecycle::{ControlAction, Orchestrator, Shutdown, Supervisor};
pub use pool::{Reconciler, SharedState};
