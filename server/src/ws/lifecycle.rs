use std::sync::Arc;

use super::protocol::ServerEvent;
use super::router::ChannelRouter;
use super::{ConnectionId, ConnectionSender};
use crate::error::HandshakeRejected;
use crate::presence::{PresenceTracker, PresenceTransition};

/// Per-connection state machine: `Connecting -> Registered -> Closed`.
/// A rejected handshake goes straight from `Connecting` to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Registered,
    Closed,
}

/// One open transport session.
///
/// The user identity is bound once at handshake and never changes afterwards.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    user_id: Option<String>,
    state: ConnectionState,
    sender: ConnectionSender,
}

impl Connection {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id: None,
            state: ConnectionState::Connecting,
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Outbound queue handle for this connection.
    pub fn sender(&self) -> &ConnectionSender {
        &self.sender
    }

    #[cfg(test)]
    pub(crate) fn registered_for_test(user_id: &str, sender: ConnectionSender) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id: Some(user_id.to_string()),
            state: ConnectionState::Registered,
            sender,
        }
    }
}

/// Orchestrates handshake and teardown for every connection.
pub struct ConnectionLifecycle {
    tracker: Arc<PresenceTracker>,
    router: Arc<ChannelRouter>,
}

impl ConnectionLifecycle {
    pub fn new(tracker: Arc<PresenceTracker>, router: Arc<ChannelRouter>) -> Self {
        Self { tracker, router }
    }

    /// Bind the claimed identity and register the connection.
    ///
    /// The connection joins its user channel before presence is updated, so it
    /// cannot miss a transition that happens between its snapshot and its
    /// subscription. It receives the online broadcast for itself (when it is
    /// the user's first connection) followed by the `presence:list` snapshot.
    ///
    /// A missing or empty identity closes the connection without registering it.
    /// Calling this on a connection that is not `Connecting` does nothing.
    pub fn on_handshake(
        &self,
        conn: &mut Connection,
        claimed_user_id: Option<&str>,
    ) -> Result<Option<PresenceTransition>, HandshakeRejected> {
        if conn.state != ConnectionState::Connecting {
            return Ok(None);
        }

        let Some(user_id) = claimed_user_id.filter(|id| !id.trim().is_empty()) else {
            conn.state = ConnectionState::Closed;
            tracing::info!(connection_id = %conn.id, "Handshake rejected: no user identity");
            return Err(HandshakeRejected);
        };

        conn.user_id = Some(user_id.to_string());

        self.router.subscribe(conn.id, user_id, conn.sender.clone());

        let transition = self.tracker.on_connect_with(user_id, conn.id, |t| {
            self.router.broadcast(&t.to_event());
        });

        let snapshot = ServerEvent::PresenceList {
            online: self.tracker.list_snapshot(),
        };
        ChannelRouter::send_to(&conn.sender, &snapshot);

        conn.state = ConnectionState::Registered;

        tracing::info!(
            user_id = %user_id,
            connection_id = %conn.id,
            connections = self.tracker.registry().connection_count(user_id),
            "Connection registered"
        );

        Ok(transition)
    }

    /// Tear down a connection. Idempotent: closing a connection that is already
    /// closed, or that never registered, has no effect on presence.
    pub fn on_close(&self, conn: &mut Connection) -> Option<PresenceTransition> {
        let previous = std::mem::replace(&mut conn.state, ConnectionState::Closed);
        if previous != ConnectionState::Registered {
            return None;
        }

        let user_id = conn.user_id.as_deref()?;

        self.router.unsubscribe(conn.id, user_id);

        let transition = self.tracker.on_disconnect_with(user_id, conn.id, |t| {
            self.router.broadcast(&t.to_event());
        });

        tracing::info!(
            user_id = %user_id,
            connection_id = %conn.id,
            "Connection closed"
        );

        transition
    }
}
