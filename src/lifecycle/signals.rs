//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for every signal in the dispatch table
//! - Translate signals to control actions
//! - Hand actions to the supervisor loop, which invokes the orchestrator
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Table is static and many-to-one; signals carry no payload
//! - Installed once at startup, torn down when the supervisor exits

use std::fmt;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Control actions the supervisor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    /// Gracefully stop every worker, then exit.
    Shutdown,
    /// One more worker.
    AddWorker,
    /// One less worker.
    RemoveWorker,
    /// Replace every worker, one at a time.
    Reload,
    /// Go back to the worker count configured at startup.
    ResetWorkers,
}

impl ControlAction {
    pub const ALL: [ControlAction; 5] = [
        ControlAction::Shutdown,
        ControlAction::AddWorker,
        ControlAction::RemoveWorker,
        ControlAction::Reload,
        ControlAction::ResetWorkers,
    ];

    /// Signals bound to this action.
    pub fn signals(self) -> impl Iterator<Item = Signal> {
        SIGNAL_TABLE
            .iter()
            .filter(move |(_, action)| *action == self)
            .map(|(signal, _)| *signal)
    }

    /// Signal `poolctl` sends to request this action.
    pub fn primary_signal(self) -> Signal {
        match self {
            ControlAction::Shutdown => Signal::SIGTERM,
            ControlAction::AddWorker => Signal::SIGTTIN,
            ControlAction::RemoveWorker => Signal::SIGTTOU,
            ControlAction::Reload => Signal::SIGHUP,
            ControlAction::ResetWorkers => Signal::SIGWINCH,
        }
    }

    pub fn for_signal(signal: Signal) -> Option<Self> {
        SIGNAL_TABLE
            .iter()
            .find(|(bound, _)| *bound == signal)
            .map(|(_, action)| *action)
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlAction::Shutdown => "shutdown",
            ControlAction::AddWorker => "add-worker",
            ControlAction::RemoveWorker => "remove-worker",
            ControlAction::Reload => "reload",
            ControlAction::ResetWorkers => "reset-workers",
        };
        f.write_str(name)
    }
}

/// Signal → action dispatch table.
pub const SIGNAL_TABLE: &[(Signal, ControlAction)] = &[
    (Signal::SIGINT, ControlAction::Shutdown),
    (Signal::SIGTERM, ControlAction::Shutdown),
    (Signal::SIGTTIN, ControlAction::AddWorker),
    (Signal::SIGTTOU, ControlAction::RemoveWorker),
    (Signal::SIGHUP, ControlAction::Reload),
    (Signal::SIGUSR2, ControlAction::Reload),
    (Signal::SIGWINCH, ControlAction::ResetWorkers),
];

/// Installed signal handlers. Dropping the dispatcher unregisters them.
#[derive(Debug)]
pub struct SignalDispatcher {
    listeners: Vec<JoinHandle<()>>,
}

impl SignalDispatcher {
    /// Register every signal in the table, forwarding actions to `actions`.
    pub fn install(actions: mpsc::UnboundedSender<ControlAction>) -> std::io::Result<Self> {
        let mut listeners = Vec::with_capacity(SIGNAL_TABLE.len());

        for &(sig, action) in SIGNAL_TABLE {
            let mut stream = signal(SignalKind::from_raw(sig as i32))?;
            let tx = actions.clone();
            listeners.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    tracing::info!(signal = sig.as_str(), action = %action, "Signal received");
                    if tx.send(action).is_err() {
                        break;
                    }
                }
            }));
        }

        tracing::debug!(signals = listeners.len(), "Signal handlers installed");
        Ok(Self { listeners })
    }

    /// Stop forwarding signals.
    pub fn uninstall(mut self) {
        self.abort_all();
        tracing::debug!("Signal handlers removed");
    }

    fn abort_all(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
    }
}

impl Drop for SignalDispatcher {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_one_action() {
        assert_eq!(ControlAction::for_signal(Signal::SIGINT), Some(ControlAction::Shutdown));
        assert_eq!(ControlAction::for_signal(Signal::SIGTERM), Some(ControlAction::Shutdown));
        assert_eq!(ControlAction::for_signal(Signal::SIGHUP), Some(ControlAction::Reload));
        assert_eq!(ControlAction::for_signal(Signal::SIGUSR2), Some(ControlAction::Reload));
        assert_eq!(ControlAction::for_signal(Signal::SIGTTIN), Some(ControlAction::AddWorker));
        assert_eq!(ControlAction::for_signal(Signal::SIGTTOU), Some(ControlAction::RemoveWorker));
        assert_eq!(ControlAction::for_signal(Signal::SIGWINCH), Some(ControlAction::ResetWorkers));
        assert_eq!(ControlAction::for_signal(Signal::SIGUSR1), None);
    }

    #[test]
    fn every_action_has_a_primary_signal() {
        for action in ControlAction::ALL {
            let primary = action.primary_signal();
            assert_eq!(ControlAction::for_signal(primary), Some(action));
        }
        assert_eq!(ControlAction::Shutdown.signals().count(), 2);
        assert_eq!(ControlAction::Reload.primary_signal(), Signal::SIGHUP);
    }

    #[tokio::test]
    async fn delivered_signal_becomes_action() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = SignalDispatcher::install(tx).unwrap();

        nix::sys::signal::raise(Signal::SIGWINCH).unwrap();

        let action = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(action, Some(ControlAction::ResetWorkers));

        dispatcher.uninstall();
    }
}
