//! Worker side of the pool.
//!
//! The `static-worker` binary is the default executable the supervisor
//! forks. It binds the shared port, announces itself on stdout and serves a
//! directory until told to drain.

pub mod server;

pub use server::{announce_listening, bind_reuseport, router, serve, BindError, DrainOutcome};
