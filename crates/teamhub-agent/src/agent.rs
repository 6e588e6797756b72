//! The client presence agent.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use teamhub_entity::presence::{PresenceSnapshot, PresenceStatus};

use crate::activity::{ActivityDebouncer, ActivityKind};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::protocol::{ClientEvent, ServerEvent, ServerFrame};
use crate::transport::{Channels, Connector, WebSocketConnector};
use crate::view::PresenceView;

/// An opened connection and the task applying its inbound frames.
#[derive(Debug)]
struct Link {
    outbound: mpsc::Sender<ClientEvent>,
    pump: AbortHandle,
}

impl Link {
    fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

#[derive(Debug)]
enum Connection {
    Disconnected,
    Open(Link),
    Left,
}

/// State shared with the inbound pump and the idle timer.
#[derive(Debug)]
struct Shared {
    config: AgentConfig,
    status: Mutex<PresenceStatus>,
    activity: Mutex<ActivityDebouncer>,
    view: RwLock<PresenceView>,
    events: broadcast::Sender<ServerEvent>,
}

/// Presence agent for one user in one project.
///
/// The connection is opened on first use and reused afterwards. Every
/// operation that needs the hub connects implicitly. A failed connect, or a
/// connection the server dropped, is reopened (and the project rejoined) by
/// the next call.
#[derive(Debug)]
pub struct PresenceAgent {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    connection: Mutex<Connection>,
    idle_timer: Mutex<Option<AbortHandle>>,
}

impl PresenceAgent {
    /// Agent connecting to `config.server_url` over WebSocket.
    pub fn new(config: AgentConfig) -> Self {
        let connector = Arc::new(WebSocketConnector::new(
            config.server_url.clone(),
            config.channel_buffer_size,
        ));
        Self::with_connector(config, connector)
    }

    /// Agent using a custom connector.
    pub fn with_connector(config: AgentConfig, connector: Arc<dyn Connector>) -> Self {
        let (events, _) = broadcast::channel(config.channel_buffer_size.max(1));
        let shared = Arc::new(Shared {
            status: Mutex::new(PresenceStatus::Offline),
            activity: Mutex::new(ActivityDebouncer::new(config.activity_debounce())),
            view: RwLock::new(PresenceView::new(config.project_id)),
            events,
            config,
        });
        Self {
            shared,
            connector,
            connection: Mutex::new(Connection::Disconnected),
            idle_timer: Mutex::new(None),
        }
    }

    /// Open the connection and join the project, if not done yet.
    pub async fn connect(&self) -> Result<(), AgentError> {
        self.outbound().await.map(|_| ())
    }

    /// Whether the connection is open and the agent has not left.
    pub async fn is_connected(&self) -> bool {
        matches!(&*self.connection.lock().await, Connection::Open(link) if link.is_open())
    }

    /// Report local input.
    ///
    /// Emits an `activity` event and re-arms the local idle timer unless an
    /// event was already emitted within the debounce interval. Returns
    /// whether an event was sent.
    pub async fn record_activity(&self, kind: ActivityKind) -> Result<bool, AgentError> {
        let outbound = self.outbound().await?;

        if !self.shared.activity.lock().await.observe(Instant::now()) {
            trace!(kind = %kind, "Activity debounced");
            return Ok(false);
        }

        let config = &self.shared.config;
        send(
            &outbound,
            ClientEvent::Activity {
                user_id: config.user_id,
                project_id: config.project_id,
            },
        )
        .await?;

        {
            let mut status = self.shared.status.lock().await;
            if *status == PresenceStatus::Idle {
                *status = PresenceStatus::Online;
            }
        }
        self.arm_idle(&outbound).await;

        debug!(kind = %kind, "Activity reported");
        Ok(true)
    }

    /// Report an explicit status, e.g. FOCUSED while a focus timer runs.
    pub async fn set_status(&self, status: PresenceStatus) -> Result<(), AgentError> {
        let outbound = self.outbound().await?;
        let config = &self.shared.config;
        send(
            &outbound,
            ClientEvent::StatusUpdate {
                user_id: config.user_id,
                project_id: config.project_id,
                status,
            },
        )
        .await?;

        *self.shared.status.lock().await = status;
        debug!(status = %status, "Status reported");
        Ok(())
    }

    /// Leave the room and close the connection.
    ///
    /// Safe to call more than once. The agent does not reconnect afterwards.
    pub async fn leave(&self) -> Result<(), AgentError> {
        if let Some(timer) = self.idle_timer.lock().await.take() {
            timer.abort();
        }
        let previous = std::mem::replace(&mut *self.connection.lock().await, Connection::Left);

        if let Connection::Open(link) = previous {
            // Dropping the last sender after this closes the socket.
            if link.outbound.send(ClientEvent::Leave).await.is_err() {
                debug!("Connection already closed before leave");
            }
            link.pump.abort();
            info!(
                user_id = %self.shared.config.user_id,
                project_id = %self.shared.config.project_id,
                "Left presence room"
            );
        }
        *self.shared.status.lock().await = PresenceStatus::Offline;
        Ok(())
    }

    /// The local user's status as last reported or confirmed.
    pub async fn status(&self) -> PresenceStatus {
        *self.shared.status.lock().await
    }

    /// Copy of the merged presence view.
    pub async fn view(&self) -> PresenceView {
        self.shared.view.read().await.clone()
    }

    /// Install a freshly fetched snapshot as the view's base.
    pub async fn load_snapshot(&self, snapshot: PresenceSnapshot) {
        self.shared.view.write().await.load_snapshot(snapshot);
    }

    /// Every event received from the hub, after it has been applied.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared.events.subscribe()
    }

    /// Sender of the live connection, opening one if there is none.
    async fn outbound(&self) -> Result<mpsc::Sender<ClientEvent>, AgentError> {
        let mut connection = self.connection.lock().await;
        match &*connection {
            Connection::Left => return Err(AgentError::Closed),
            Connection::Open(link) if link.is_open() => return Ok(link.outbound.clone()),
            Connection::Open(link) => {
                link.pump.abort();
                warn!(
                    user_id = %self.shared.config.user_id,
                    project_id = %self.shared.config.project_id,
                    "Presence connection lost, reconnecting"
                );
            }
            Connection::Disconnected => {}
        }

        *connection = Connection::Disconnected;
        let link = self.open().await?;
        let outbound = link.outbound.clone();
        *connection = Connection::Open(link);
        Ok(outbound)
    }

    async fn open(&self) -> Result<Link, AgentError> {
        let Channels { outbound, inbound } = self.connector.connect().await?;
        let config = &self.shared.config;

        send(
            &outbound,
            ClientEvent::Join {
                user_id: config.user_id,
                project_id: config.project_id,
            },
        )
        .await?;
        *self.shared.status.lock().await = PresenceStatus::Online;
        self.arm_idle(&outbound).await;

        let pump = tokio::spawn(pump_inbound(
            inbound,
            outbound.downgrade(),
            Arc::clone(&self.shared),
        ));

        info!(
            user_id = %config.user_id,
            project_id = %config.project_id,
            "Joined presence room"
        );
        Ok(Link {
            outbound,
            pump: pump.abort_handle(),
        })
    }

    /// (Re)start the local idle timer, superseding the pending one.
    async fn arm_idle(&self, outbound: &mpsc::Sender<ClientEvent>) {
        let outbound = outbound.downgrade();
        let shared = Arc::clone(&self.shared);
        let delay = shared.config.idle_timeout();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(outbound) = outbound.upgrade() else {
                return;
            };
            let event = ClientEvent::StatusUpdate {
                user_id: shared.config.user_id,
                project_id: shared.config.project_id,
                status: PresenceStatus::Idle,
            };
            if send(&outbound, event).await.is_ok() {
                *shared.status.lock().await = PresenceStatus::Idle;
                shared.activity.lock().await.reset();
                debug!("Local idle timeout, reported IDLE");
            }
        });

        if let Some(previous) = self.idle_timer.lock().await.replace(task.abort_handle()) {
            previous.abort();
        }
    }
}

async fn send(outbound: &mpsc::Sender<ClientEvent>, event: ClientEvent) -> Result<(), AgentError> {
    outbound.send(event).await.map_err(|_| AgentError::Closed)
}

/// Apply inbound frames until the connection closes.
async fn pump_inbound(
    mut inbound: mpsc::Receiver<ServerFrame>,
    outbound: mpsc::WeakSender<ClientEvent>,
    shared: Arc<Shared>,
) {
    let mut last_seq = 0u64;

    while let Some(frame) = inbound.recv().await {
        if let Some(seq) = frame.seq {
            if seq <= last_seq {
                debug!(seq, last_seq, "Broadcast sequence went backwards");
            }
            last_seq = last_seq.max(seq);
        }

        match &frame.event {
            ServerEvent::Presence {
                user_id,
                project_id,
                status,
                timestamp,
            } => {
                shared
                    .view
                    .write()
                    .await
                    .apply(*project_id, *user_id, *status, *timestamp);
                if *user_id == shared.config.user_id && *project_id == shared.config.project_id {
                    *shared.status.lock().await = *status;
                }
            }
            ServerEvent::Ping { timestamp } => {
                if let Some(outbound) = outbound.upgrade() {
                    let pong = ClientEvent::Pong {
                        timestamp: Some(*timestamp),
                    };
                    if send(&outbound, pong).await.is_err() {
                        break;
                    }
                }
            }
            ServerEvent::Error { code, message } => {
                warn!(code = %code, message = %message, "Hub rejected a frame");
            }
            ServerEvent::ChatNew { .. } => {}
        }

        // No subscribers is fine.
        let _ = shared.events.send(frame.event);
    }

    debug!("Presence connection closed");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use teamhub_core::types::id::{ProjectId, UserId};

    use super::*;

    #[derive(Debug, Default)]
    struct ChannelConnector {
        channels: std::sync::Mutex<Option<Channels>>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl Connector for ChannelConnector {
        async fn connect(&self) -> Result<Channels, AgentError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.channels
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| AgentError::Connect {
                    url: "memory".to_string(),
                    message: "refused".to_string(),
                })
        }
    }

    struct Harness {
        agent: PresenceAgent,
        connector: Arc<ChannelConnector>,
        sent: mpsc::Receiver<ClientEvent>,
        server: mpsc::Sender<ServerFrame>,
        config: AgentConfig,
    }

    fn harness() -> Harness {
        let config = AgentConfig::new("ws://test/ws", UserId::new(), ProjectId::new());
        let (outbound, sent) = mpsc::channel(64);
        let (server, inbound) = mpsc::channel(64);
        let connector = Arc::new(ChannelConnector {
            channels: std::sync::Mutex::new(Some(Channels { outbound, inbound })),
            connects: AtomicUsize::new(0),
        });
        let agent = PresenceAgent::with_connector(config.clone(), connector.clone());
        Harness {
            agent,
            connector,
            sent,
            server,
            config,
        }
    }

    fn activity(config: &AgentConfig) -> ClientEvent {
        ClientEvent::Activity {
            user_id: config.user_id,
            project_id: config.project_id,
        }
    }

    fn idle(config: &AgentConfig) -> ClientEvent {
        ClientEvent::StatusUpdate {
            user_id: config.user_id,
            project_id: config.project_id,
            status: PresenceStatus::Idle,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_lazily_and_joins_once() {
        let mut h = harness();
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 0);
        assert!(!h.agent.is_connected().await);

        assert!(h.agent.record_activity(ActivityKind::Mouse).await.unwrap());
        assert!(!h.agent.record_activity(ActivityKind::Keyboard).await.unwrap());
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
        assert!(h.agent.is_connected().await);

        assert_eq!(
            h.sent.recv().await,
            Some(ClientEvent::Join {
                user_id: h.config.user_id,
                project_id: h.config.project_id,
            })
        );
        assert_eq!(h.sent.recv().await, Some(activity(&h.config)));
        assert!(h.sent.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_is_debounced() {
        let mut h = harness();
        h.agent.connect().await.unwrap();
        h.sent.recv().await;

        assert!(h.agent.record_activity(ActivityKind::Scroll).await.unwrap());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!h.agent.record_activity(ActivityKind::Scroll).await.unwrap());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(h.agent.record_activity(ActivityKind::Touch).await.unwrap());

        assert_eq!(h.sent.recv().await, Some(activity(&h.config)));
        assert_eq!(h.sent.recv().await, Some(activity(&h.config)));
        assert!(h.sent.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_idle_timeout_reports_idle() {
        let mut h = harness();
        h.agent.connect().await.unwrap();
        h.sent.recv().await;
        h.agent.record_activity(ActivityKind::Keyboard).await.unwrap();
        assert_eq!(h.sent.recv().await, Some(activity(&h.config)));

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(h.sent.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.sent.recv().await, Some(idle(&h.config)));
        assert_eq!(h.agent.status().await, PresenceStatus::Idle);

        // Coming back is reported immediately.
        assert!(h.agent.record_activity(ActivityKind::Mouse).await.unwrap());
        assert_eq!(h.sent.recv().await, Some(activity(&h.config)));
        assert_eq!(h.agent.status().await, PresenceStatus::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_rearms_idle_timer() {
        let mut h = harness();
        h.agent.connect().await.unwrap();
        h.sent.recv().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        h.agent.record_activity(ActivityKind::Mouse).await.unwrap();
        assert_eq!(h.sent.recv().await, Some(activity(&h.config)));

        // The timer armed on connect would have fired at 120 s.
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert!(h.sent.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(51)).await;
        assert_eq!(h.sent.recv().await, Some(idle(&h.config)));
    }

    #[tokio::test]
    async fn test_answers_server_ping() {
        let mut h = harness();
        h.agent.connect().await.unwrap();
        h.sent.recv().await;

        h.server
            .send(ServerEvent::Ping { timestamp: 42 }.into())
            .await
            .unwrap();
        assert_eq!(
            h.sent.recv().await,
            Some(ClientEvent::Pong {
                timestamp: Some(42)
            })
        );
    }

    #[tokio::test]
    async fn test_presence_broadcasts_update_view_and_status() {
        let h = harness();
        let mut events = h.agent.subscribe();
        h.agent.connect().await.unwrap();
        let other = UserId::new();

        for (user_id, status) in [
            (other, PresenceStatus::Online),
            (h.config.user_id, PresenceStatus::Focused),
        ] {
            h.server
                .send(ServerFrame {
                    seq: Some(1),
                    event: ServerEvent::Presence {
                        user_id,
                        project_id: h.config.project_id,
                        status,
                        timestamp: Utc::now(),
                    },
                })
                .await
                .unwrap();
            events.recv().await.unwrap();
        }

        let view = h.agent.view().await;
        assert_eq!(view.status_of(other), PresenceStatus::Online);
        assert_eq!(h.agent.status().await, PresenceStatus::Focused);
    }

    #[tokio::test]
    async fn test_leave_sends_leave_and_closes() {
        let mut h = harness();
        h.agent.set_status(PresenceStatus::Focused).await.unwrap();
        h.sent.recv().await;
        assert_eq!(
            h.sent.recv().await,
            Some(ClientEvent::StatusUpdate {
                user_id: h.config.user_id,
                project_id: h.config.project_id,
                status: PresenceStatus::Focused,
            })
        );

        h.agent.leave().await.unwrap();
        assert_eq!(h.sent.recv().await, Some(ClientEvent::Leave));
        assert_eq!(h.sent.recv().await, None);
        assert_eq!(h.agent.status().await, PresenceStatus::Offline);
        assert!(!h.agent.is_connected().await);

        assert!(matches!(
            h.agent.record_activity(ActivityKind::Mouse).await,
            Err(AgentError::Closed)
        ));
        h.agent.leave().await.unwrap();
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_connection_reconnects_and_rejoins() {
        let mut h = harness();
        h.agent.connect().await.unwrap();
        assert!(matches!(h.sent.recv().await, Some(ClientEvent::Join { .. })));

        // The server goes away.
        drop(h.sent);
        assert!(!h.agent.is_connected().await);

        let (outbound, mut sent) = mpsc::channel(64);
        let (_server, inbound) = mpsc::channel(64);
        *h.connector.channels.lock().unwrap() = Some(Channels { outbound, inbound });

        h.agent.set_status(PresenceStatus::Focused).await.unwrap();
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 2);
        assert!(h.agent.is_connected().await);

        assert_eq!(
            sent.recv().await,
            Some(ClientEvent::Join {
                user_id: h.config.user_id,
                project_id: h.config.project_id,
            })
        );
        assert_eq!(
            sent.recv().await,
            Some(ClientEvent::StatusUpdate {
                user_id: h.config.user_id,
                project_id: h.config.project_id,
                status: PresenceStatus::Focused,
            })
        );
        assert_eq!(h.agent.status().await, PresenceStatus::Focused);
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried() {
        let connector = Arc::new(ChannelConnector::default());
        let config = AgentConfig::new("ws://test/ws", UserId::new(), ProjectId::new());
        let agent = PresenceAgent::with_connector(config, connector.clone());

        assert!(matches!(
            agent.connect().await,
            Err(AgentError::Connect { .. })
        ));
        assert!(agent.connect().await.is_err());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }
}
