//! Static file server run inside every worker process.
//!
//! # Responsibilities
//! - Bind a port shared with sibling workers (`SO_REUSEPORT`)
//! - Report the bound address to the supervisor
//! - Serve a directory, drain on request, give up after a deadline

use std::future::{Future, IntoFuture};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Notify;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::process::WorkerMessage;

const LISTEN_BACKLOG: u32 = 1024;

/// Error type for binding the worker listener.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("{0} is already in use")]
    AddrInUse(SocketAddr),
    #[error("{0} requires elevated privileges")]
    PermissionDenied(SocketAddr),
    #[error("failed to bind {addr}: {source}")]
    Other {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    fn classify(addr: SocketAddr, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AddrInUse => BindError::AddrInUse(addr),
            io::ErrorKind::PermissionDenied => BindError::PermissionDenied(addr),
            _ => BindError::Other { addr, source },
        }
    }
}

/// Bind `addr` so that every worker in the pool can share it.
pub fn bind_reuseport(addr: SocketAddr) -> Result<TcpListener, BindError> {
    let bind = || -> io::Result<TcpListener> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.set_reuseport(true)?;
        socket.bind(addr)?;
        socket.listen(LISTEN_BACKLOG)
    };
    bind().map_err(|e| BindError::classify(addr, e))
}

/// Tell the supervisor this worker is accepting connections.
pub fn announce_listening(address: SocketAddr) -> io::Result<()> {
    let line = WorkerMessage::Listening { address }
        .to_line()
        .map_err(io::Error::other)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished.
    Drained,
    /// Connections were still open when the deadline passed.
    TimedOut,
}

pub fn router(static_dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}

/// Serve `static_dir` until `shutdown` resolves, then stop accepting and
/// wait at most `drain_timeout` for open connections.
pub async fn serve<F>(
    listener: TcpListener,
    static_dir: &Path,
    drain_timeout: Duration,
    shutdown: F,
) -> io::Result<DrainOutcome>
where
    F: Future<Output = ()> + Send + 'static,
{
    let draining = Arc::new(Notify::new());
    let notify = draining.clone();
    let signal = async move {
        shutdown.await;
        notify.notify_one();
    };

    let server = axum::serve(listener, router(static_dir))
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result?;
            return Ok(DrainOutcome::Drained);
        }
        _ = draining.notified() => {}
    }

    tracing::info!(timeout_secs = drain_timeout.as_secs(), "Draining connections");
    match tokio::time::timeout(drain_timeout, server).await {
        Ok(result) => {
            result?;
            Ok(DrainOutcome::Drained)
        }
        Err(_) => Ok(DrainOutcome::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn two_listeners_share_a_port() {
        let first = bind_reuseport("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = first.local_addr().unwrap();

        let second = bind_reuseport(addr).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn plain_listener_blocks_reuse() {
        let plain = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = plain.local_addr().unwrap();

        match bind_reuseport(addr) {
            Err(BindError::AddrInUse(reported)) => assert_eq!(reported, addr),
            other => panic!("expected AddrInUse, got {other:?}"),
        }
    }

    #[test]
    fn bind_errors_read_well() {
        let addr: SocketAddr = "0.0.0.0:80".parse().unwrap();
        let err = BindError::classify(addr, io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), "0.0.0.0:80 requires elevated privileges");
    }
}
