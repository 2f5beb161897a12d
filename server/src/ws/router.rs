use dashmap::DashMap;

use super::protocol::ServerEvent;
use super::{ConnectionId, ConnectionSender};

/// Name of the fan-out channel for a user identity.
pub fn channel_name(user_id: &str) -> String {
    format!("user:{}", user_id)
}

#[derive(Debug)]
struct Subscriber {
    connection_id: ConnectionId,
    sender: ConnectionSender,
}

/// Per-user fan-out channels.
///
/// Each live connection subscribes to `user:<id>` for its own identity, so an
/// event addressed to a user reaches every one of that user's connections
/// without the sender knowing any connection ids. Channels are created on first
/// subscribe and never destroyed; publishing to an empty or unknown channel is a
/// silent no-op.
#[derive(Debug, Default)]
pub struct ChannelRouter {
    channels: DashMap<String, Vec<Subscriber>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Attach a connection to its user's channel.
    pub fn subscribe(&self, connection_id: ConnectionId, user_id: &str, sender: ConnectionSender) {
        let mut channel = self.channels.entry(channel_name(user_id)).or_default();
        if channel.iter().any(|s| s.connection_id == connection_id) {
            return;
        }
        channel.push(Subscriber {
            connection_id,
            sender,
        });
    }

    /// Detach a connection. Also drops any subscribers whose connection has
    /// already gone away.
    pub fn unsubscribe(&self, connection_id: ConnectionId, user_id: &str) {
        if let Some(mut channel) = self.channels.get_mut(&channel_name(user_id)) {
            channel.retain(|s| s.connection_id != connection_id && !s.sender.is_closed());
        }
    }

    /// Fan an event out to every connection subscribed to `target_user`'s channel.
    /// Returns the number of connections the event was queued for.
    pub fn publish(&self, target_user: &str, event: &ServerEvent) -> usize {
        let Some(channel) = self.channels.get(&channel_name(target_user)) else {
            return 0;
        };
        if channel.is_empty() {
            return 0;
        }
        let Some(msg) = event.to_message() else {
            return 0;
        };

        channel
            .iter()
            .filter(|s| s.sender.send(msg.clone()).is_ok())
            .count()
    }

    /// Send an event to every subscribed connection of every user.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(msg) = event.to_message() else {
            return 0;
        };

        let mut delivered = 0;
        for channel in self.channels.iter() {
            for subscriber in channel.value().iter() {
                if subscriber.sender.send(msg.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Point-to-point send on a single connection's queue.
    pub fn send_to(sender: &ConnectionSender, event: &ServerEvent) -> bool {
        match event.to_message() {
            Some(msg) => sender.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.channels
            .get(&channel_name(user_id))
            .map(|c| c.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }
}
