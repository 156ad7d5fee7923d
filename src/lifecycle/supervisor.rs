//! Supervisor event loop.
//!
//! Routes process events to the reconciler and control actions to the
//! orchestrator until the shutdown coordinator fires. Shutdown and reload
//! poll for seconds at a time, so they run as their own tasks while the
//! loop keeps delivering the exit and listening events they wait on.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::lifecycle::orchestrator::Orchestrator;
use crate::lifecycle::signals::ControlAction;
use crate::process::WorkerEvent;

pub struct Supervisor {
    orchestrator: Orchestrator,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    actions: mpsc::UnboundedReceiver<ControlAction>,
    shutdown_rx: broadcast::Receiver<()>,
    protocols: Vec<JoinHandle<()>>,
}

impl Supervisor {
    pub fn new(
        orchestrator: Orchestrator,
        events: mpsc::UnboundedReceiver<WorkerEvent>,
        actions: mpsc::UnboundedReceiver<ControlAction>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            orchestrator,
            events,
            actions,
            shutdown_rx,
            protocols: Vec::new(),
        }
    }

    /// Run until the pool has drained for good.
    pub async fn run(mut self) {
        tracing::info!("Supervisor started");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    break;
                }
                Some(event) = self.events.recv() => {
                    self.orchestrator.reconciler().handle_event(event);
                }
                Some(action) = self.actions.recv() => {
                    self.dispatch(action);
                }
                else => {
                    tracing::warn!("All supervisor channels closed");
                    break;
                }
            }
        }

        for protocol in self.protocols.drain(..) {
            protocol.abort();
        }
        tracing::info!("Supervisor stopped");
    }

    fn dispatch(&mut self, action: ControlAction) {
        tracing::debug!(action = %action, "Dispatching control action");
        self.protocols.retain(|protocol| !protocol.is_finished());

        match action {
            ControlAction::Shutdown => {
                let orchestrator = self.orchestrator.clone();
                self.protocols.push(tokio::spawn(async move {
                    orchestrator.shutdown_and_restart(0).await;
                }));
            }
            ControlAction::Reload => {
                let orchestrator = self.orchestrator.clone();
                self.protocols.push(tokio::spawn(async move {
                    orchestrator.reload(None).await;
                }));
            }
            ControlAction::AddWorker => {
                self.orchestrator.inc_workers();
            }
            ControlAction::RemoveWorker => {
                self.orchestrator.dec_workers();
            }
            ControlAction::ResetWorkers => {
                self.orchestrator.reset_workers();
            }
        }
    }
}
