use std::collections::HashMap;

use super::ConnectionId;

/// Display names of the connections currently present in a room.
///
/// Not synchronized on its own; the relay owns it behind its lock.
#[derive(Debug, Default)]
pub struct PresenceDirectory {
    names: HashMap<ConnectionId, String>,
}

impl PresenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite the display name for a connection.
    pub fn put(&mut self, conn_id: &str, display_name: &str) {
        self.names.insert(conn_id.to_string(), display_name.to_string());
    }

    /// Forget a connection, returning the name it had.
    pub fn remove(&mut self, conn_id: &str) -> Option<String> {
        self.names.remove(conn_id)
    }

    /// Look up a display name. Empty names read as absent.
    pub fn get(&self, conn_id: &str) -> Option<&str> {
        self.names
            .get(conn_id)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_overwrites_previous_name() {
        let mut presence = PresenceDirectory::new();
        presence.put("c1", "alice");
        presence.put("c1", "alice2");

        assert_eq!(presence.get("c1"), Some("alice2"));
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn missing_and_empty_names_are_absent() {
        let mut presence = PresenceDirectory::new();
        presence.put("c1", "");

        assert_eq!(presence.get("c1"), None);
        assert_eq!(presence.get("nobody"), None);
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn remove_returns_the_old_name() {
        let mut presence = PresenceDirectory::new();
        presence.put("c1", "alice");

        assert_eq!(presence.remove("c1").as_deref(), Some("alice"));
        assert_eq!(presence.remove("c1"), None);
        assert_eq!(presence.get("c1"), None);
    }
}
