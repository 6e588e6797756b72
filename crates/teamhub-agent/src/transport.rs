//! Connections from the agent to the hub.
//!
//! A [`Connector`] yields a pair of channels; the agent never touches the
//! socket directly, which lets tests drive it with in-memory channels.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::protocol::{ClientEvent, ServerFrame};

/// Channel pair for one live connection.
///
/// Dropping every `outbound` sender closes the connection.
#[derive(Debug)]
pub struct Channels {
    /// Events to send.
    pub outbound: mpsc::Sender<ClientEvent>,
    /// Frames received.
    pub inbound: mpsc::Receiver<ServerFrame>,
}

/// Opens connections to the hub.
#[async_trait]
pub trait Connector: Send + Sync + Debug + 'static {
    /// Open a new connection.
    async fn connect(&self) -> Result<Channels, AgentError>;
}

/// Connector over a real WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    buffer: usize,
}

impl WebSocketConnector {
    /// Connector for `url` with the given channel capacity.
    pub fn new(url: impl Into<String>, buffer: usize) -> Self {
        Self {
            url: url.into(),
            buffer: buffer.max(1),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Channels, AgentError> {
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| AgentError::Connect {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        debug!(url = %self.url, "Presence socket connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientEvent>(self.buffer);
        let (inbound_tx, inbound_rx) = mpsc::channel::<ServerFrame>(self.buffer);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = outbound_rx.recv() => {
                        let Some(event) = event else {
                            let _ = sink.send(Message::Close(None)).await;
                            let _ = sink.close().await;
                            break;
                        };
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "Dropping unencodable event");
                                continue;
                            }
                        };
                        if sink.send(Message::text(text)).await.is_err() {
                            break;
                        }
                    }
                    message = stream.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerFrame>(text.as_str()) {
                                Ok(frame) => {
                                    if inbound_tx.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => debug!(error = %e, "Ignoring unrecognized frame"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "Presence socket error");
                            break;
                        }
                    },
                }
            }
            // Dropping the receiver marks every outbound sender closed.
            debug!("Presence socket closed");
        });

        Ok(Channels {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
