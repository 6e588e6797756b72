//! Room broadcast envelope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use teamhub_core::types::id::ProjectId;

use super::types::OutboundMessage;

/// Outbound room message with delivery metadata.
///
/// The payload is flattened, so an envelope reads as the plain message plus
/// `id`, `room` and `seq` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Unique message ID.
    pub id: Uuid,
    /// Room the message was broadcast to.
    pub room: ProjectId,
    /// Per-room sequence number, increasing in broadcast order.
    pub seq: u64,
    /// The message payload.
    #[serde(flatten)]
    pub data: OutboundMessage,
}

impl MessageEnvelope {
    /// Wrap a message broadcast to `room` as its `seq`-th message.
    pub fn new(room: ProjectId, seq: u64, data: OutboundMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            room,
            seq,
            data,
        }
    }
}
