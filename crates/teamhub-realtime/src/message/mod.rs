//! WebSocket wire messages, room envelopes and frame validation.

pub mod envelope;
pub mod types;
pub mod validator;

pub use envelope::MessageEnvelope;
pub use types::{InboundMessage, OutboundMessage, error_codes};
