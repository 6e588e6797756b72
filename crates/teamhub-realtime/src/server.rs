//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::info;

use teamhub_core::clock::Clock;
use teamhub_core::config::{PresenceConfig, RealtimeConfig};
use teamhub_core::error::AppError;
use teamhub_database::store::{PresenceStore, ProjectDirectory};

use crate::connection::hub::ConnectionHub;
use crate::metrics::RealtimeMetrics;
use crate::presence::idle_timer::IdleTimerRegistry;
use crate::presence::session_manager::SessionManager;
use crate::presence::snapshot::SnapshotBuilder;

/// Central real-time engine that coordinates presence and WebSocket subsystems.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Connection hub.
    pub hub: Arc<ConnectionHub>,
    /// Presence session manager.
    pub sessions: Arc<SessionManager>,
    /// Presence snapshot builder.
    pub snapshots: Arc<SnapshotBuilder>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
    /// Background idle forwarder.
    forwarder: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.hub.connection_count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine and starts its background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        realtime: RealtimeConfig,
        presence: PresenceConfig,
        store: Arc<dyn PresenceStore>,
        directory: Arc<dyn ProjectDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let metrics = Arc::new(RealtimeMetrics::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&store),
            Arc::new(IdleTimerRegistry::new()),
            Arc::clone(&clock),
            presence,
        ));
        let snapshots = Arc::new(SnapshotBuilder::new(
            store,
            Arc::clone(&directory),
            clock,
        ));
        let hub = Arc::new(ConnectionHub::new(
            realtime,
            Arc::clone(&sessions),
            directory,
            Arc::clone(&metrics),
        ));
        let forwarder = hub.spawn_idle_forwarder(shutdown_tx.subscribe());

        info!("Real-time engine initialized");

        Self {
            hub,
            sessions,
            snapshots,
            metrics,
            shutdown_tx,
            forwarder: Arc::new(Mutex::new(Some(forwarder))),
        }
    }

    /// Initiates a graceful shutdown of the real-time engine.
    ///
    /// Ends every tracked presence session, closes all connections and stops
    /// the idle timers.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        info!("Shutting down real-time engine");

        let _ = self.shutdown_tx.send(());
        if let Some(forwarder) = self.forwarder.lock().await.take() {
            forwarder
                .await
                .map_err(|e| AppError::internal(format!("Idle forwarder panicked: {e}")))?;
        }

        self.hub.close_all().await;
        self.sessions.shutdown();

        info!("Real-time engine shut down");
        Ok(())
    }
}
