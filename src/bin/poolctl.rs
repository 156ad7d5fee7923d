//! Control CLI for a running cluster-supervisor.
//!
//! Each command sends the signal the supervisor binds to that action.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nix::sys::signal::kill;
use nix::unistd::Pid;

use cluster_supervisor::lifecycle::startup::read_pid;
use cluster_supervisor::lifecycle::ControlAction;

#[derive(Parser)]
#[command(name = "poolctl")]
#[command(about = "Control a running cluster-supervisor", long_about = None)]
struct Cli {
    #[command(flatten)]
    target: Target,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Supervisor process id
    #[arg(long)]
    pid: Option<i32>,

    /// Pid file written by the supervisor
    #[arg(long, env = "POOL_PID_FILE")]
    pid_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Drain every worker and stop the supervisor
    Stop,
    /// Start one more worker
    Add,
    /// Retire one worker
    Remove,
    /// Replace every worker, one at a time
    Reload,
    /// Return to the worker count configured at startup
    Reset,
}

impl Commands {
    fn action(self) -> ControlAction {
        match self {
            Commands::Stop => ControlAction::Shutdown,
            Commands::Add => ControlAction::AddWorker,
            Commands::Remove => ControlAction::RemoveWorker,
            Commands::Reload => ControlAction::Reload,
            Commands::Reset => ControlAction::ResetWorkers,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let pid = match (cli.target.pid, cli.target.pid_file.as_deref()) {
        (Some(pid), _) => pid,
        (None, Some(path)) => {
            read_pid(path).ok_or_else(|| format!("no valid pid in {}", path.display()))?
        }
        (None, None) => return Err("pass --pid or --pid-file".into()),
    };

    let action = cli.command.action();
    let signal = action.primary_signal();

    kill(Pid::from_raw(pid), signal)
        .map_err(|e| format!("failed to signal {}: {}", pid, e))?;
    println!("Sent {} ({}) to {}", signal.as_str(), action, pid);
    Ok(())
}
