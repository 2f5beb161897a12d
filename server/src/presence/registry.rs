use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

use crate::ws::ConnectionId;

/// Connection registry: tracks every open connection per user identity.
///
/// A user can hold several concurrent connections (multiple devices/tabs). A
/// user appears in the map if and only if at least one of its connections is
/// open; the entry is removed as soon as the last connection goes away.
///
/// Each mutation runs under the DashMap shard lock for that user's key, so
/// `add`/`remove` for one user are linearizable. Nothing in here awaits.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: DashMap<String, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Insert a connection for a user. Returns true if it is the user's first
    /// open connection.
    pub fn add(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        self.add_then(user_id, connection_id, |first| first)
    }

    /// Remove a connection for a user. Returns true if it was the user's last
    /// open connection. Removing an unknown connection is a no-op.
    pub fn remove(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        self.remove_then(user_id, connection_id, |last| last)
    }

    /// Like [`add`](Self::add), but runs `f` with the first-connection flag while
    /// the user's entry is still locked.
    ///
    /// `f` must not block and must not touch this registry.
    pub fn add_then<R>(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
        f: impl FnOnce(bool) -> R,
    ) -> R {
        let mut entry = self.users.entry(user_id.to_string()).or_default();
        let first = entry.is_empty();
        entry.insert(connection_id);

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            connections = entry.len(),
            "Connection registered"
        );

        let out = f(first);
        drop(entry);
        out
    }

    /// Like [`remove`](Self::remove), but runs `f` with the last-connection flag
    /// while the user's entry is still locked.
    ///
    /// `f` must not block and must not touch this registry.
    pub fn remove_then<R>(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
        f: impl FnOnce(bool) -> R,
    ) -> R {
        match self.users.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(&connection_id);
                let empty = entry.get().is_empty();

                tracing::debug!(
                    user_id = %user_id,
                    connection_id = %connection_id,
                    removed = removed,
                    connections = entry.get().len(),
                    "Connection unregistered"
                );

                let out = f(removed && empty);
                if empty {
                    entry.remove();
                }
                out
            }
            Entry::Vacant(_) => f(false),
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Number of open connections for a user (0 when offline).
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.users.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    /// All user identities with at least one open connection.
    pub fn snapshot_online_users(&self) -> HashSet<String> {
        self.users.iter().map(|entry| entry.key().clone()).collect()
    }
}
