//! Shared application state for the API server.
//!
//! [`AppState`] holds the supervisor that serves every command, the
//! simulation controller behind the lifecycle endpoints, and the broadcast
//! sender the `/ws` stream subscribes to.

use std::sync::Arc;

use tanktwin_core::runner::SimulationController;
use tanktwin_core::supervisor::Supervisor;
use tanktwin_types::TwinEvent;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The single owner of the tank state.
    pub supervisor: Arc<Supervisor>,
    /// Start/stop control over the tick loop.
    pub simulation: Arc<SimulationController>,
    /// Sender side of the event channel the supervisor publishes to.
    pub tx: broadcast::Sender<TwinEvent>,
}

impl AppState {
    /// Bundle the shared handles.
    pub const fn new(
        supervisor: Arc<Supervisor>,
        simulation: Arc<SimulationController>,
        tx: broadcast::Sender<TwinEvent>,
    ) -> Self {
        Self {
            supervisor,
            simulation,
            tx,
        }
    }

    /// Subscribe to the event stream.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<TwinEvent> {
        self.tx.subscribe()
    }
}
