//! Agent error type.

use thiserror::Error;

/// Errors surfaced by the presence agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The WebSocket could not be opened.
    #[error("failed to connect to {url}: {message}")]
    Connect {
        /// Server URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// The connection is gone or the agent has left.
    #[error("presence connection closed")]
    Closed,
    /// An event could not be encoded.
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}
