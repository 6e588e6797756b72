//! WebSocket connection management: pool, handles, heartbeat, rooms and the hub.

pub mod handle;
pub mod heartbeat;
pub mod hub;
pub mod pool;
pub mod room;

pub use handle::ConnectionHandle;
pub use hub::ConnectionHub;
