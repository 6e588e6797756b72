//! # teamhub-agent
//!
//! Client side of TeamHub presence. A [`PresenceAgent`] keeps one lazily
//! opened WebSocket to the connection hub, joins the configured project,
//! turns raw input activity into debounced `activity` events, demotes itself
//! to IDLE after a local inactivity timeout, answers server pings and merges
//! presence broadcasts into a [`PresenceView`].

pub mod activity;
pub mod agent;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod view;

pub use activity::ActivityKind;
pub use agent::PresenceAgent;
pub use config::AgentConfig;
pub use error::AgentError;
pub use view::PresenceView;
