use std::sync::Arc;

use super::registry::ConnectionRegistry;
use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionId;

/// An online/offline edge for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceTransition {
    Online(String),
    Offline(String),
}

impl PresenceTransition {
    pub fn user_id(&self) -> &str {
        match self {
            PresenceTransition::Online(id) | PresenceTransition::Offline(id) => id,
        }
    }

    /// The broadcast event announcing this transition.
    pub fn to_event(&self) -> ServerEvent {
        match self {
            PresenceTransition::Online(id) => ServerEvent::PresenceOnline {
                user_id: id.clone(),
            },
            PresenceTransition::Offline(id) => ServerEvent::PresenceOffline {
                user_id: id.clone(),
            },
        }
    }
}

/// Turns registry mutations into edge-triggered presence transitions.
///
/// A user goes online on its first connection and offline when its last one
/// closes, never once per physical connection.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceTracker {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn on_connect(&self, user_id: &str, connection_id: ConnectionId) -> Option<PresenceTransition> {
        self.on_connect_with(user_id, connection_id, |_| {})
    }

    pub fn on_disconnect(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
    ) -> Option<PresenceTransition> {
        self.on_disconnect_with(user_id, connection_id, |_| {})
    }

    /// Register a connection and, on the online edge, call `emit` while the
    /// user's registry entry is still held. Broadcasting from `emit` keeps one
    /// user's online/offline announcements in the same order as the mutations.
    pub fn on_connect_with(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
        emit: impl FnOnce(&PresenceTransition),
    ) -> Option<PresenceTransition> {
        self.registry.add_then(user_id, connection_id, |first| {
            if !first {
                return None;
            }
            let transition = PresenceTransition::Online(user_id.to_string());
            tracing::info!(user_id = %user_id, "User online");
            emit(&transition);
            Some(transition)
        })
    }

    /// Counterpart of [`on_connect_with`](Self::on_connect_with) for the offline edge.
    pub fn on_disconnect_with(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
        emit: impl FnOnce(&PresenceTransition),
    ) -> Option<PresenceTransition> {
        self.registry.remove_then(user_id, connection_id, |last| {
            if !last {
                return None;
            }
            let transition = PresenceTransition::Offline(user_id.to_string());
            tracing::info!(user_id = %user_id, "User offline");
            emit(&transition);
            Some(transition)
        })
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.registry.is_online(user_id)
    }

    /// Currently online users, sorted for a stable snapshot.
    pub fn list_snapshot(&self) -> Vec<String> {
        let mut online: Vec<String> = self.registry.snapshot_online_users().into_iter().collect();
        online.sort();
        online
    }
}
