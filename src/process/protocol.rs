//! Supervisor ↔ worker wire protocol.
//!
//! Workers report lifecycle events as newline-delimited JSON on stdout.
//! Settings flow the other way through environment variables. Both binaries
//! share the names below.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

pub const ENV_WORKER_ID: &str = "POOL_WORKER_ID";
pub const ENV_ENVIRONMENT: &str = "POOL_ENVIRONMENT";
pub const ENV_BIND_ADDRESS: &str = "POOL_BIND_ADDRESS";
pub const ENV_STATIC_DIR: &str = "POOL_STATIC_DIR";
pub const ENV_DRAIN_TIMEOUT_SECS: &str = "POOL_DRAIN_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "POOL_LOG_LEVEL";

/// Exit code of a worker that could not bind its listener.
pub const BIND_FAILURE_EXIT_CODE: i32 = 3;

/// Exit code of a worker whose drain outlived the grace period.
pub const DRAIN_TIMEOUT_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// The worker bound its listener and accepts connections.
    Listening { address: SocketAddr },
}

impl WorkerMessage {
    /// Encode as a single protocol line (without the trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a protocol line. Returns `None` for ordinary output.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listening_line_format() {
        let msg = WorkerMessage::Listening {
            address: "127.0.0.1:3000".parse().unwrap(),
        };
        assert_eq!(
            msg.to_line().unwrap(),
            r#"{"type":"listening","address":"127.0.0.1:3000"}"#
        );
    }

    #[test]
    fn plain_output_is_not_a_message() {
        assert_eq!(WorkerMessage::parse_line("GET /index.html 200"), None);
        assert_eq!(WorkerMessage::parse_line(r#"{"type":"unknown"}"#), None);
        assert_eq!(
            WorkerMessage::parse_line("  {\"type\":\"listening\",\"address\":\"[::1]:80\"}\n"),
            Some(WorkerMessage::Listening {
                address: "[::1]:80".parse().unwrap()
            })
        );
    }
}
