//! Default pool worker: serves a static directory on the shared port.
//!
//! Settings come from the environment the supervisor sets up; every one of
//! them can also be passed as a flag when running the worker by hand.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::signal::unix::{signal, SignalKind};

use cluster_supervisor::observability::logging::init_logging;
use cluster_supervisor::process::protocol::{
    BIND_FAILURE_EXIT_CODE, DRAIN_TIMEOUT_EXIT_CODE, ENV_BIND_ADDRESS, ENV_DRAIN_TIMEOUT_SECS,
    ENV_ENVIRONMENT, ENV_LOG_LEVEL, ENV_STATIC_DIR, ENV_WORKER_ID,
};
use cluster_supervisor::worker::{announce_listening, bind_reuseport, serve, DrainOutcome};

#[derive(Parser, Debug)]
#[command(name = "static-worker")]
#[command(about = "Static file worker for cluster-supervisor", long_about = None)]
struct Args {
    /// Address to listen on (shared with sibling workers)
    #[arg(long, env = ENV_BIND_ADDRESS, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Directory to serve
    #[arg(long, env = ENV_STATIC_DIR, default_value = "public")]
    static_dir: PathBuf,

    /// Seconds to wait for open connections after a drain starts
    #[arg(long, env = ENV_DRAIN_TIMEOUT_SECS, default_value_t = 10)]
    drain_timeout_secs: u64,

    /// Id assigned by the supervisor. When set, EOF on stdin means the
    /// supervisor is gone.
    #[arg(long, env = ENV_WORKER_ID)]
    worker_id: Option<u64>,

    #[arg(long, env = ENV_ENVIRONMENT, default_value = "development")]
    environment: String,

    #[arg(long, env = ENV_LOG_LEVEL, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level, false)?;

    let worker_id = args.worker_id.unwrap_or(0);

    let listener = match bind_reuseport(args.bind) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(worker_id, error = %e, "Cannot listen: {}", e);
            std::process::exit(BIND_FAILURE_EXIT_CODE);
        }
    };
    let address = listener.local_addr()?;
    announce_listening(address)?;

    tracing::debug!(
        worker_id,
        environment = %args.environment,
        address = %address,
        static_dir = ?args.static_dir,
        "Serving"
    );

    let outcome = serve(
        listener,
        &args.static_dir,
        Duration::from_secs(args.drain_timeout_secs),
        drain_requested(args.worker_id.is_some()),
    )
    .await?;

    match outcome {
        DrainOutcome::Drained => {
            tracing::debug!(worker_id, "Drained, exiting");
            Ok(())
        }
        DrainOutcome::TimedOut => {
            tracing::warn!(worker_id, "Connections still open after drain timeout, forcing exit");
            std::process::exit(DRAIN_TIMEOUT_EXIT_CODE);
        }
    }
}

/// Resolves on SIGTERM, SIGINT or, under a supervisor, stdin EOF.
async fn drain_requested(watch_stdin: bool) {
    let stdin_closed = async {
        if !watch_stdin {
            return std::future::pending::<()>().await;
        }
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = stdin_closed => tracing::debug!("Supervisor channel closed"),
        _ = terminate => tracing::debug!("Received SIGTERM"),
        _ = tokio::signal::ctrl_c() => tracing::debug!("Received SIGINT"),
    }
}
