//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI / environment overrides (main.rs)
//!     → SupervisorConfig (validated, read once at startup)
//!
//! While running:
//!     watcher.rs detects a new worker executable
//!     → queues a rolling reload on the control channel
//! ```
//!
//! # Design Decisions
//! - Config is read once; pool size changes go through control signals
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use schema::SupervisorConfig;
pub use schema::TimingConfig;
pub use schema::WorkerConfig;
