//! Worker termination analysis.
//!
//! Converts a child's exit status into something the supervisor can log and
//! count. Whatever happened inside the worker reaches the core only as one of
//! these values.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

use crate::process::protocol::BIND_FAILURE_EXIT_CODE;

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, for a normal exit.
    pub code: Option<i32>,
    /// Raw signal number, when killed by a signal.
    pub signal: Option<i32>,
}

impl WorkerExit {
    pub const fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub const fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Status could not be collected.
    pub const fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// The worker gave up because its listener could not be bound.
    pub fn is_bind_failure(&self) -> bool {
        self.code == Some(BIND_FAILURE_EXIT_CODE)
    }

    /// Short label used as a metrics dimension.
    pub fn cause(&self) -> &'static str {
        match (self.code, self.signal) {
            (Some(0), _) => "clean",
            (Some(BIND_FAILURE_EXIT_CODE), _) => "bind_failure",
            (Some(_), _) => "error",
            (None, Some(_)) => "signal",
            (None, None) => "unknown",
        }
    }

    fn signal_name(raw: i32) -> String {
        Signal::try_from(raw)
            .map(|sig| sig.as_str().to_string())
            .unwrap_or_else(|_| format!("signal {raw}"))
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (_, Some(sig)) => write!(f, "killed by signal: {}", Self::signal_name(sig)),
            (Some(code), None) => write!(f, "exited with code: {code}"),
            (None, None) => write!(f, "exited for an unknown reason"),
        }
    }
}
