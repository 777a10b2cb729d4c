pub mod guard;
pub mod presence;
pub mod relay;
pub mod rooms;
pub mod session;

/// Opaque id assigned to a transport session when it connects.
pub type ConnectionId = String;
