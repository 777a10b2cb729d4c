use std::sync::Arc;

use super::relay::Relay;
use super::ConnectionId;

/// Detaches a connection from the relay when dropped, so a handler future
/// that is cancelled mid-flight still leaves no presence or membership behind.
pub struct ConnectionGuard {
    relay: Arc<Relay>,
    conn_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn new(relay: Arc<Relay>, conn_id: ConnectionId) -> Self {
        Self { relay, conn_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.relay.disconnect(&self.conn_id);
    }
}
