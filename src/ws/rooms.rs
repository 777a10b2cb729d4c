use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::ConnectionId;

/// Serialized frames waiting to be written to one connection's socket.
pub type Outbox = mpsc::Sender<String>;

/// Room membership and message delivery.
///
/// A room is nothing more than its member list: it appears on the first join
/// and is dropped as soon as the last member leaves. Delivery never blocks;
/// a member whose outbox is closed or full is skipped and logged.
#[derive(Debug, Default)]
pub struct RoomBroadcastEngine {
    rooms: HashMap<String, Vec<ConnectionId>>,
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl RoomBroadcastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outbox of a freshly connected transport session.
    pub fn attach(&mut self, conn_id: &str, outbox: Outbox) {
        self.outboxes.insert(conn_id.to_string(), outbox);
    }

    /// Drop the outbox of a connection. Returns false if it was not attached.
    pub fn detach(&mut self, conn_id: &str) -> bool {
        self.outboxes.remove(conn_id).is_some()
    }

    pub fn is_attached(&self, conn_id: &str) -> bool {
        self.outboxes.contains_key(conn_id)
    }

    /// Add a connection to a room. Returns false if it already was a member.
    pub fn join(&mut self, conn_id: &str, room_id: &str) -> bool {
        let members = self.rooms.entry(room_id.to_string()).or_default();
        if members.iter().any(|m| m == conn_id) {
            return false;
        }
        members.push(conn_id.to_string());
        true
    }

    /// Remove a connection from a room, dropping the room once it is empty.
    pub fn leave(&mut self, conn_id: &str, room_id: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| m != conn_id);
        let removed = members.len() != before;
        if members.is_empty() {
            self.rooms.remove(room_id);
            debug!("Room {} is empty and was dropped", room_id);
        }
        removed
    }

    /// Snapshot of a room's members in join order.
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }

    pub fn is_member(&self, conn_id: &str, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.iter().any(|m| m == conn_id))
    }

    /// Every room the connection currently belongs to.
    pub fn rooms_of(&self, conn_id: &str) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == conn_id))
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    /// Deliver a frame to every member of a room except `exclude`.
    ///
    /// Returns how many members accepted the frame.
    pub fn broadcast(&self, room_id: &str, exclude: Option<&str>, frame: &str) -> usize {
        let Some(members) = self.rooms.get(room_id) else {
            return 0;
        };
        members
            .iter()
            .filter(|m| Some(m.as_str()) != exclude)
            .filter(|m| self.send_to(m, frame))
            .count()
    }

    /// Deliver a frame to one connection. Unknown connections are a no-op.
    pub fn send_to(&self, conn_id: &str, frame: &str) -> bool {
        let Some(outbox) = self.outboxes.get(conn_id) else {
            debug!("Dropping frame for unknown connection {}", conn_id);
            return false;
        };
        match outbox.try_send(frame.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbox of connection {} is full, dropping frame", conn_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbox of connection {} is closed, dropping frame", conn_id);
                false
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self) -> usize {
        self.rooms.values().map(Vec::len).sum()
    }

    pub fn connection_count(&self) -> usize {
        self.outboxes.len()
    }
}
