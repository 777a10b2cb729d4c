use serde::{Deserialize, Serialize};
use serde_json::Value;

// Client -> server

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub room_id: Option<String>,
    pub username: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BufferChangeMessage {
    pub room_id: Option<String>,
    pub payload: Option<Value>,
}

/// Point-to-point sync with one peer.
///
/// Without a payload it asks the target for its current buffer; with one it
/// pushes that buffer to the target directly.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestMessage {
    pub target_connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// A buffer snapshot addressed to one connection.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncCodeMessage {
    pub target_connection_id: Option<String>,
    pub payload: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "join")]
    Join(JoinMessage),
    #[serde(rename = "buffer-change")]
    BufferChange(BufferChangeMessage),
    #[serde(rename = "sync-request")]
    SyncRequest(SyncRequestMessage),
    #[serde(rename = "sync-code")]
    SyncCode(SyncCodeMessage),
    #[serde(rename = "ping")]
    Ping,
}

// Server -> client

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub connection_id: String,
    pub username: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterUpdateMessage {
    pub members: Vec<RosterEntry>,
    pub joined_username: String,
    pub joined_connection_id: String,
}

impl RosterUpdateMessage {
    /// The peer a newcomer should bootstrap its buffer from: the most recently
    /// listed member other than itself. `None` when it is alone in the room.
    pub fn bootstrap_peer(&self, own_connection_id: &str) -> Option<&str> {
        self.members
            .iter()
            .rev()
            .map(|m| m.connection_id.as_str())
            .find(|id| *id != own_connection_id)
    }
}

/// Instructs a peer to send its buffer to `requester_connection_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncInstructionMessage {
    pub requester_connection_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BufferUpdateMessage {
    pub payload: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberLeftMessage {
    pub connection_id: String,
    pub username: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "roster-update")]
    RosterUpdate(RosterUpdateMessage),
    #[serde(rename = "sync-request")]
    SyncRequest(SyncInstructionMessage),
    #[serde(rename = "buffer-change")]
    BufferChange(BufferUpdateMessage),
    #[serde(rename = "member-left")]
    MemberLeft(MemberLeftMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(connection_id: &str, username: &str) -> RosterEntry {
        RosterEntry {
            connection_id: connection_id.into(),
            username: Some(username.into()),
        }
    }

    #[test]
    fn parses_join_frame() {
        let frame = json!({"type": "join", "roomId": "r1", "username": "alice"});
        let msg: ReceivedMessage = serde_json::from_value(frame).unwrap();
        match msg {
            ReceivedMessage::Join(join) => {
                assert_eq!(join.room_id.as_deref(), Some("r1"));
                assert_eq!(join.username.as_deref(), Some("alice"));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn join_frame_with_missing_fields_still_parses() {
        let msg: ReceivedMessage = serde_json::from_value(json!({"type": "join"})).unwrap();
        assert!(matches!(
            msg,
            ReceivedMessage::Join(JoinMessage { room_id: None, username: None })
        ));
    }

    #[test]
    fn sync_request_payload_is_optional() {
        let bare: ReceivedMessage =
            serde_json::from_value(json!({"type": "sync-request", "targetConnectionId": "c2"}))
                .unwrap();
        assert!(matches!(
            bare,
            ReceivedMessage::SyncRequest(SyncRequestMessage { payload: None, .. })
        ));

        let push: ReceivedMessage = serde_json::from_value(
            json!({"type": "sync-request", "targetConnectionId": "c2", "payload": "x = 1"}),
        )
        .unwrap();
        match push {
            ReceivedMessage::SyncRequest(request) => {
                assert_eq!(request.target_connection_id.as_deref(), Some("c2"));
                assert_eq!(request.payload, Some(json!("x = 1")));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let res = serde_json::from_value::<ReceivedMessage>(json!({"type": "explode"}));
        assert!(res.is_err());
    }

    #[test]
    fn roster_update_wire_shape() {
        let msg = SendMessage::RosterUpdate(RosterUpdateMessage {
            members: vec![entry("c1", "alice")],
            joined_username: "alice".into(),
            joined_connection_id: "c1".into(),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "roster-update",
                "members": [{"connectionId": "c1", "username": "alice"}],
                "joinedUsername": "alice",
                "joinedConnectionId": "c1",
            })
        );
    }

    #[test]
    fn bootstrap_peer_picks_latest_other_member() {
        let roster = RosterUpdateMessage {
            members: vec![
                entry("a", "alice"),
                entry("b", "bob"),
                entry("c", "carol"),
            ],
            joined_username: "carol".into(),
            joined_connection_id: "c".into(),
        };
        assert_eq!(roster.bootstrap_peer("c"), Some("b"));
        assert_eq!(roster.bootstrap_peer("a"), Some("c"));
    }

    #[test]
    fn bootstrap_peer_is_none_when_alone() {
        let roster = RosterUpdateMessage {
            members: vec![entry("a", "alice")],
            joined_username: "alice".into(),
            joined_connection_id: "a".into(),
        };
        assert_eq!(roster.bootstrap_peer("a"), None);
    }
}
