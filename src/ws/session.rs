use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use super::relay::Relay;
use super::ConnectionId;
use crate::models::{
    BufferChangeMessage, BufferUpdateMessage, JoinMessage, PongMessage, ReceivedMessage,
    SendMessage, SyncCodeMessage, SyncInstructionMessage, SyncRequestMessage,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Transport is up, no room joined yet.
    Connected,
    /// A join is being applied.
    Joining,
    /// Member of exactly one room.
    Active { room_id: String },
    /// Terminal.
    Disconnected,
}

/// Protocol state of one connection.
///
/// Each inbound event maps to one transition function. Malformed or
/// out-of-state events are dropped without a reply.
pub struct Session {
    conn_id: ConnectionId,
    state: SessionState,
    relay: Arc<Relay>,
}

impl Session {
    pub fn new(conn_id: ConnectionId, relay: Arc<Relay>) -> Self {
        Self {
            conn_id,
            state: SessionState::Connected,
            relay,
        }
    }

    #[cfg(test)]
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn room_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Active { room_id } => Some(room_id.as_str()),
            _ => None,
        }
    }

    /// Dispatch a decoded client frame.
    pub fn handle(&mut self, msg: ReceivedMessage) {
        match msg {
            ReceivedMessage::Join(join) => self.on_join(join),
            ReceivedMessage::BufferChange(change) => self.on_buffer_change(change),
            ReceivedMessage::SyncRequest(request) => self.on_sync_request(request),
            ReceivedMessage::SyncCode(code) => self.on_sync_code(code),
            ReceivedMessage::Ping => self.on_ping(),
        }
    }

    pub fn on_join(&mut self, msg: JoinMessage) {
        if self.state == SessionState::Disconnected {
            return;
        }
        let room_id = non_empty(msg.room_id);
        let username = non_empty(msg.username);
        let (Some(room_id), Some(username)) = (room_id, username) else {
            debug!("Connection {} sent an incomplete join, ignoring", self.conn_id);
            return;
        };

        let previous = std::mem::replace(&mut self.state, SessionState::Joining);
        self.state = match self.relay.join(&self.conn_id, &room_id, &username) {
            Some(_) => SessionState::Active { room_id },
            None => previous,
        };
    }

    pub fn on_buffer_change(&mut self, msg: BufferChangeMessage) {
        let room_id = non_empty(msg.room_id);
        let (Some(room_id), Some(payload)) = (room_id, msg.payload) else {
            debug!("Connection {} sent an incomplete change, ignoring", self.conn_id);
            return;
        };
        if self.room_id() != Some(room_id.as_str()) {
            debug!(
                "Connection {} is not active in room {}, ignoring change",
                self.conn_id, room_id
            );
            return;
        }
        self.relay.relay_change(&self.conn_id, &room_id, payload);
    }

    /// First hop of the bootstrap handshake: ask a peer for its buffer.
    ///
    /// A request that already carries a payload is a push and goes to the
    /// target as a snapshot, like `sync-code`.
    pub fn on_sync_request(&mut self, msg: SyncRequestMessage) {
        let Some(target) = non_empty(msg.target_connection_id) else {
            return;
        };
        if self.room_id().is_none() {
            return;
        }
        if let Some(payload) = msg.payload {
            self.send_snapshot(&target, payload);
            return;
        }
        let instruction = SendMessage::SyncRequest(SyncInstructionMessage {
            requester_connection_id: self.conn_id.clone(),
        });
        if !self.relay.relay_to(&self.conn_id, &target, &instruction) {
            info!(
                "Sync target {} for {} is gone, starting from an empty buffer",
                target, self.conn_id
            );
        }
    }

    /// Second hop of the bootstrap handshake: a snapshot for the requester.
    pub fn on_sync_code(&mut self, msg: SyncCodeMessage) {
        let target = non_empty(msg.target_connection_id);
        let (Some(target), Some(payload)) = (target, msg.payload) else {
            return;
        };
        if self.room_id().is_none() {
            return;
        }
        self.send_snapshot(&target, payload);
    }

    fn send_snapshot(&self, target: &str, payload: Value) {
        let snapshot = SendMessage::BufferChange(BufferUpdateMessage { payload });
        if !self.relay.relay_to(&self.conn_id, target, &snapshot) {
            debug!("Snapshot target {} for {} is gone, dropping", target, self.conn_id);
        }
    }

    pub fn on_ping(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
        self.relay.send_to(&self.conn_id, &pong);
    }

    /// Runs against relay state only, so it completes whether or not the
    /// socket is still open.
    pub fn on_disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.relay.disconnect(&self.conn_id);
        self.state = SessionState::Disconnected;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
