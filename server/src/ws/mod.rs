pub mod actor;
pub mod handler;
pub mod lifecycle;
pub mod protocol;
pub mod router;

use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Type alias for the sender half of a WebSocket connection's outbound queue.
/// Other parts of the system clone this to push messages to a specific client;
/// the connection's writer task is the only reader.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Receiving half of a connection's outbound queue, drained by the writer task.
pub type ConnectionReceiver = mpsc::UnboundedReceiver<axum::extract::ws::Message>;

/// Transport-assigned identifier, unique per physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Create a fresh outbound queue for one connection.
pub fn connection_channel() -> (ConnectionSender, ConnectionReceiver) {
    mpsc::unbounded_channel()
}
