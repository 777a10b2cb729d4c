use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, error, info};

use super::presence::PresenceDirectory;
use super::rooms::{Outbox, RoomBroadcastEngine};
use super::ConnectionId;
use crate::models::{
    BufferUpdateMessage, MemberLeftMessage, RosterEntry, RosterUpdateMessage, SendMessage,
};

/// Counters reported by the diagnostics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub rooms: usize,
    pub members: usize,
    pub present: usize,
}

struct RelayState {
    presence: PresenceDirectory,
    rooms: RoomBroadcastEngine,
}

/// Process-wide presence and room state.
///
/// Presence and membership live behind one lock and are only ever changed
/// together, so a member never lacks a presence entry and a detached
/// connection never keeps either. Critical sections never await: frames are
/// handed to bounded outboxes with `try_send`.
pub struct Relay {
    state: Mutex<RelayState>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RelayState {
                presence: PresenceDirectory::new(),
                rooms: RoomBroadcastEngine::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        // A panic while holding the lock leaves the maps usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new transport session.
    pub fn connect(&self, conn_id: &str, outbox: Outbox) {
        self.lock().rooms.attach(conn_id, outbox);
        debug!("Connection {} attached", conn_id);
    }

    /// Put a connection into a room and send the resulting roster to every
    /// member, the joiner included.
    ///
    /// A connection already sitting in another room leaves it first. Returns
    /// `None` when the connection is no longer attached.
    pub fn join(&self, conn_id: &str, room_id: &str, username: &str) -> Option<Vec<RosterEntry>> {
        let mut state = self.lock();
        if !state.rooms.is_attached(conn_id) {
            debug!("Ignoring join of detached connection {}", conn_id);
            return None;
        }

        let previous_rooms = state.rooms.rooms_of(conn_id);
        for previous in previous_rooms.iter().filter(|r| r.as_str() != room_id) {
            depart(&mut state, conn_id, previous);
        }

        state.presence.put(conn_id, username);
        state.rooms.join(conn_id, room_id);

        let members = roster(&state, room_id);
        let frame = encode(&SendMessage::RosterUpdate(RosterUpdateMessage {
            members: members.clone(),
            joined_username: username.to_string(),
            joined_connection_id: conn_id.to_string(),
        }));
        if let Some(frame) = frame {
            state.rooms.broadcast(room_id, None, &frame);
        }

        info!("{} ({}) joined room {} ({} members)", username, conn_id, room_id, members.len());
        Some(members)
    }

    /// Forward a buffer change to the other members of the sender's room.
    ///
    /// Returns the number of members reached; zero if the sender is not a
    /// member of `room_id`.
    pub fn relay_change(&self, conn_id: &str, room_id: &str, payload: Value) -> usize {
        let state = self.lock();
        if !state.rooms.is_member(conn_id, room_id) {
            debug!("Connection {} is not in room {}, dropping change", conn_id, room_id);
            return 0;
        }
        let frame = encode(&SendMessage::BufferChange(BufferUpdateMessage { payload }));
        frame.map_or(0, |frame| state.rooms.broadcast(room_id, Some(conn_id), &frame))
    }

    /// Point-to-point delivery between two members of a shared room.
    ///
    /// A target that left or never shared a room with the sender is treated as
    /// stale and the message is dropped.
    pub fn relay_to(&self, from: &str, target: &str, msg: &SendMessage) -> bool {
        let state = self.lock();
        let shared = state
            .rooms
            .rooms_of(from)
            .iter()
            .any(|room_id| state.rooms.is_member(target, room_id));
        if !shared {
            debug!("Target {} shares no room with {}, dropping", target, from);
            return false;
        }
        encode(msg).is_some_and(|frame| state.rooms.send_to(target, &frame))
    }

    /// Deliver a message to one connection.
    pub fn send_to(&self, conn_id: &str, msg: &SendMessage) -> bool {
        let state = self.lock();
        encode(msg).is_some_and(|frame| state.rooms.send_to(conn_id, &frame))
    }

    /// Tear down everything held for a connection.
    ///
    /// Remaining members of each of its rooms are told it left. Safe to call
    /// more than once. Returns the rooms the connection was in.
    pub fn disconnect(&self, conn_id: &str) -> Vec<String> {
        let mut state = self.lock();
        let rooms = state.rooms.rooms_of(conn_id);
        for room_id in &rooms {
            depart(&mut state, conn_id, room_id);
        }
        let name = state.presence.remove(conn_id);
        let was_attached = state.rooms.detach(conn_id);
        if was_attached {
            info!(
                "Connection {} ({}) disconnected from {} room(s)",
                conn_id,
                name.as_deref().unwrap_or("anonymous"),
                rooms.len()
            );
        }
        rooms
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.lock().rooms.members(room_id)
    }

    pub fn rooms_of(&self, conn_id: &str) -> Vec<String> {
        self.lock().rooms.rooms_of(conn_id)
    }

    pub fn display_name(&self, conn_id: &str) -> Option<String> {
        self.lock().presence.get(conn_id).map(str::to_string)
    }

    pub fn stats(&self) -> RelayStats {
        let state = self.lock();
        RelayStats {
            connections: state.rooms.connection_count(),
            rooms: state.rooms.room_count(),
            members: state.rooms.member_count(),
            present: state.presence.len(),
        }
    }
}

fn roster(state: &RelayState, room_id: &str) -> Vec<RosterEntry> {
    state
        .rooms
        .members(room_id)
        .into_iter()
        .map(|connection_id| RosterEntry {
            username: state.presence.get(&connection_id).map(str::to_string),
            connection_id,
        })
        .collect()
}

/// Announce a departure to the rest of the room, then leave it.
fn depart(state: &mut RelayState, conn_id: &str, room_id: &str) {
    let frame = encode(&SendMessage::MemberLeft(MemberLeftMessage {
        connection_id: conn_id.to_string(),
        username: state.presence.get(conn_id).map(str::to_string),
    }));
    if let Some(frame) = frame {
        state.rooms.broadcast(room_id, Some(conn_id), &frame);
    }
    state.rooms.leave(conn_id, room_id);
}

fn encode(msg: &SendMessage) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!("Failed to serialize outgoing message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncInstructionMessage;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc::{self, Receiver};

    fn connect(relay: &Relay, conn_id: &str) -> Receiver<String> {
        let (tx, rx) = mpsc::channel(64);
        relay.connect(conn_id, tx);
        rx
    }

    fn drain(rx: &mut Receiver<String>) -> Vec<SendMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn roster_ids(msg: &SendMessage) -> Vec<String> {
        match msg {
            SendMessage::RosterUpdate(update) => {
                update.members.iter().map(|m| m.connection_id.clone()).collect()
            }
            other => panic!("expected roster update, got {other:?}"),
        }
    }

    #[test]
    fn roster_after_nth_join_lists_exactly_the_joined() {
        let relay = Relay::new();
        let mut receivers = Vec::new();
        for n in 1..=4 {
            let id = format!("c{n}");
            receivers.push(connect(&relay, &id));
            let members = relay.join(&id, "room", &format!("user{n}")).unwrap();
            assert_eq!(members.len(), n);

            let expected: Vec<String> = (1..=n).map(|i| format!("c{i}")).collect();
            for rx in receivers.iter_mut() {
                let msgs = drain(rx);
                assert_eq!(msgs.len(), 1);
                assert_eq!(roster_ids(&msgs[0]), expected);
            }
        }
    }

    #[test]
    fn lone_joiner_gets_a_single_member_roster() {
        let relay = Relay::new();
        let mut rx = connect(&relay, "a");
        relay.join("a", "room", "alice");

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            SendMessage::RosterUpdate(update) => {
                assert_eq!(update.members.len(), 1);
                assert_eq!(update.joined_username, "alice");
                assert_eq!(update.joined_connection_id, "a");
                assert_eq!(update.bootstrap_peer("a"), None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn change_reaches_everyone_but_the_sender() {
        let relay = Relay::new();
        let mut rx_a = connect(&relay, "a");
        let mut rx_b = connect(&relay, "b");
        let mut rx_c = connect(&relay, "c");
        for (id, name) in [("a", "alice"), ("b", "bob"), ("c", "carol")] {
            relay.join(id, "room", name);
        }
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        let reached = relay.relay_change("a", "room", json!("print(1)"));

        assert_eq!(reached, 2);
        assert!(drain(&mut rx_a).is_empty());
        let expected =
            SendMessage::BufferChange(BufferUpdateMessage { payload: json!("print(1)") });
        assert_eq!(drain(&mut rx_b), vec![expected.clone()]);
        assert_eq!(drain(&mut rx_c), vec![expected]);
    }

    #[test]
    fn change_from_outside_the_room_is_dropped() {
        let relay = Relay::new();
        let mut rx_a = connect(&relay, "a");
        let _rx_b = connect(&relay, "b");
        relay.join("a", "room", "alice");
        drain(&mut rx_a);

        assert_eq!(relay.relay_change("b", "room", json!("x")), 0);
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn disconnect_clears_presence_and_membership() {
        let relay = Relay::new();
        let mut rx_a = connect(&relay, "a");
        let _rx_b = connect(&relay, "b");
        relay.join("a", "room", "alice");
        relay.join("b", "room", "bob");
        drain(&mut rx_a);

        let left = relay.disconnect("b");

        assert_eq!(left, vec!["room".to_string()]);
        assert_eq!(relay.members("room"), vec!["a".to_string()]);
        assert_eq!(relay.display_name("b"), None);
        assert!(relay.rooms_of("b").is_empty());
        assert_eq!(
            drain(&mut rx_a),
            vec![SendMessage::MemberLeft(MemberLeftMessage {
                connection_id: "b".into(),
                username: Some("bob".into()),
            })]
        );

        // The next roster no longer mentions the departed connection.
        let _rx_c = connect(&relay, "c");
        relay.join("c", "room", "carol");
        let msgs = drain(&mut rx_a);
        assert_eq!(roster_ids(&msgs[0]), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let relay = Relay::new();
        let _rx = connect(&relay, "a");
        relay.join("a", "room", "alice");

        assert_eq!(relay.disconnect("a").len(), 1);
        assert!(relay.disconnect("a").is_empty());
        assert_eq!(relay.stats(), RelayStats { connections: 0, rooms: 0, members: 0, present: 0 });
    }

    #[test]
    fn join_after_disconnect_leaves_nothing_behind() {
        let relay = Relay::new();
        let _rx = connect(&relay, "a");
        relay.disconnect("a");

        assert!(relay.join("a", "room", "alice").is_none());
        assert!(relay.members("room").is_empty());
        assert_eq!(relay.display_name("a"), None);
    }

    #[test]
    fn joining_another_room_leaves_the_first() {
        let relay = Relay::new();
        let _rx_a = connect(&relay, "a");
        let mut rx_b = connect(&relay, "b");
        relay.join("a", "one", "alice");
        relay.join("b", "one", "bob");
        drain(&mut rx_b);

        relay.join("a", "two", "alice");

        assert_eq!(relay.rooms_of("a"), vec!["two".to_string()]);
        assert_eq!(relay.members("one"), vec!["b".to_string()]);
        assert!(matches!(drain(&mut rx_b).as_slice(), [SendMessage::MemberLeft(_)]));
    }

    #[test]
    fn relay_to_requires_a_shared_room() {
        let relay = Relay::new();
        let _rx_a = connect(&relay, "a");
        let mut rx_b = connect(&relay, "b");
        let mut rx_c = connect(&relay, "c");
        relay.join("a", "one", "alice");
        relay.join("b", "one", "bob");
        relay.join("c", "two", "carol");
        drain(&mut rx_b);
        drain(&mut rx_c);

        let msg = SendMessage::SyncRequest(SyncInstructionMessage {
            requester_connection_id: "a".into(),
        });
        assert!(relay.relay_to("a", "b", &msg));
        assert!(!relay.relay_to("a", "c", &msg));
        assert!(!relay.relay_to("a", "gone", &msg));
        assert_eq!(drain(&mut rx_b), vec![msg]);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_and_disconnects_stay_consistent() {
        let relay = Arc::new(Relay::new());
        let mut tasks = Vec::new();
        for n in 0..64 {
            let relay = relay.clone();
            tasks.push(tokio::spawn(async move {
                let id = format!("c{n}");
                let (tx, _rx) = mpsc::channel(256);
                relay.connect(&id, tx);
                relay.join(&id, "room", &format!("user{n}"));
                tokio::task::yield_now().await;
                // Every odd connection leaves again.
                if n % 2 == 1 {
                    relay.disconnect(&id);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let members = relay.members("room");
        assert_eq!(members.len(), 32);
        for id in &members {
            assert!(relay.display_name(id).is_some());
        }
        let stats = relay.stats();
        assert_eq!(stats.members, stats.present);
    }
}
