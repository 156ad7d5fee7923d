//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events: worker listening, exited,
//!                   reload and shutdown progress)
//!     → metrics.rs (gauges and counters for the pool)
//!
//! Consumers:
//!     → stderr (human-readable or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Every state transition gets a log line with `worker_id`/`pid` fields
//! - Metrics are cheap (atomic increments) and off by default

pub mod logging;
pub mod metrics;
