//! Per-connection event relay.
//!
//! Chat and typing events are forwarded verbatim to the target user's channel.
//! Notifications are enriched from the profile store first; a failed or slow
//! lookup drops that one event (at-most-once, best effort).

pub mod enrich;

use std::sync::Arc;
use std::time::Duration;

use crate::ws::lifecycle::Connection;
use crate::ws::protocol::{relay_target, target_of, ClientEvent, NotificationPayload, ServerEvent};
use crate::ws::router::ChannelRouter;
use enrich::{enrich_notification, ProfileStore};

/// Why an inbound event was not published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No `to` field (or an empty one).
    MissingTarget,
    /// The source connection never completed its handshake.
    SourceNotRegistered,
    EnrichmentFailed,
    EnrichmentTimedOut,
}

/// Result of handling one inbound event: exactly one publish, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Published to the target channel; `delivered` is the number of
    /// connections it was queued for (0 if the target is offline).
    Published { delivered: usize },
    Dropped(DropReason),
}

pub struct EventRelay {
    router: Arc<ChannelRouter>,
    store: Arc<dyn ProfileStore>,
    enrichment_timeout: Duration,
}

impl EventRelay {
    pub fn new(
        router: Arc<ChannelRouter>,
        store: Arc<dyn ProfileStore>,
        enrichment_timeout: Duration,
    ) -> Self {
        Self {
            router,
            store,
            enrichment_timeout,
        }
    }

    /// Dispatch one inbound event from `source`.
    pub async fn handle(&self, source: &Connection, event: ClientEvent) -> RelayOutcome {
        let Some(source_user) = source.user_id() else {
            tracing::debug!(
                connection_id = %source.id(),
                event = event.kind(),
                "Dropping event from unregistered connection"
            );
            return RelayOutcome::Dropped(DropReason::SourceNotRegistered);
        };

        match event {
            ClientEvent::ChatSend(payload) => {
                let Some(target) = relay_target(&payload).map(str::to_string) else {
                    return dropped_untargeted(source_user, "chat:send");
                };
                self.publish(source_user, &target, ServerEvent::ChatMessage(payload))
            }
            ClientEvent::Typing(payload) => {
                let Some(target) = relay_target(&payload).map(str::to_string) else {
                    return dropped_untargeted(source_user, "typing");
                };
                self.publish(source_user, &target, ServerEvent::Typing(payload))
            }
            ClientEvent::StopTyping(payload) => {
                let Some(target) = relay_target(&payload).map(str::to_string) else {
                    return dropped_untargeted(source_user, "stop:typing");
                };
                self.publish(source_user, &target, ServerEvent::StopTyping(payload))
            }
            ClientEvent::Notification(payload) => {
                let Some(target) = target_of(&payload.to).map(str::to_string) else {
                    return dropped_untargeted(source_user, "notification");
                };
                self.relay_notification(source_user, &target, payload).await
            }
        }
    }

    async fn relay_notification(
        &self,
        source_user: &str,
        target: &str,
        mut payload: NotificationPayload,
    ) -> RelayOutcome {
        let sender_id = match target_of(&payload.from) {
            Some(from) => from.to_string(),
            None => {
                payload.from = Some(source_user.to_string());
                source_user.to_string()
            }
        };
        let kind = payload.kind.clone().unwrap_or_default();

        let lookup = enrich_notification(self.store.as_ref(), &sender_id, payload);
        match tokio::time::timeout(self.enrichment_timeout, lookup).await {
            Ok(Ok(enriched)) => {
                self.publish(source_user, target, ServerEvent::Notification(enriched))
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    user_id = %source_user,
                    target = %target,
                    notification_type = %kind,
                    error = %e,
                    "Notification enrichment failed, dropping event"
                );
                RelayOutcome::Dropped(DropReason::EnrichmentFailed)
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %source_user,
                    target = %target,
                    notification_type = %kind,
                    timeout_ms = self.enrichment_timeout.as_millis() as u64,
                    "Notification enrichment timed out, dropping event"
                );
                RelayOutcome::Dropped(DropReason::EnrichmentTimedOut)
            }
        }
    }

    fn publish(&self, source_user: &str, target: &str, event: ServerEvent) -> RelayOutcome {
        let delivered = self.router.publish(target, &event);
        tracing::debug!(
            user_id = %source_user,
            target = %target,
            event = event.kind(),
            delivered = delivered,
            "Relayed event"
        );
        RelayOutcome::Published { delivered }
    }
}

fn dropped_untargeted(source_user: &str, kind: &str) -> RelayOutcome {
    tracing::debug!(user_id = %source_user, event = %kind, "Dropping event without target");
    RelayOutcome::Dropped(DropReason::MissingTarget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::RelayPayload;
    use serde_json::json;
    use crate::ws::{connection_channel, ConnectionId, ConnectionReceiver};
    use axum::extract::ws::Message;
    use super::enrich::tests::FakeStore;

    fn registered(user: &str) -> Connection {
        let (tx, _rx) = connection_channel();
        Connection::registered_for_test(user, tx)
    }

    fn listen(router: &ChannelRouter, user: &str) -> ConnectionReceiver {
        let (tx, rx) = connection_channel();
        router.subscribe(ConnectionId::new(), user, tx);
        rx
    }

    fn next_event(rx: &mut ConnectionReceiver) -> Option<ServerEvent> {
        match rx.try_recv().ok()? {
            Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
            _ => None,
        }
    }

    fn relay_with(store: FakeStore, timeout: Duration) -> (EventRelay, Arc<ChannelRouter>) {
        let router = Arc::new(ChannelRouter::new());
        let relay = EventRelay::new(router.clone(), Arc::new(store), timeout);
        (relay, router)
    }

    fn object(value: serde_json::Value) -> RelayPayload {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("Expected a JSON object, got {}", other),
        }
    }

    fn chat(to: Option<&str>, text: &str) -> RelayPayload {
        let mut payload = object(json!({
            "conversationId": "conv-1",
            "from": "bob",
            "text": text,
            "createdAt": "2024-05-01T10:00:00.000Z"
        }));
        if let Some(to) = to {
            payload.insert("to".to_string(), json!(to));
        }
        payload
    }

    fn like(entity_id: &str) -> NotificationPayload {
        NotificationPayload {
            to: Some("alice".to_string()),
            from: Some("bob".to_string()),
            kind: Some("LIKE".to_string()),
            entity_id: Some(entity_id.to_string()),
            ..NotificationPayload::default()
        }
    }

    #[tokio::test]
    async fn test_chat_send_relayed_as_chat_message() {
        let (relay, router) = relay_with(FakeStore::default(), Duration::from_secs(1));
        let mut alice = listen(&router, "alice");
        let mut bob = listen(&router, "bob");

        let outcome = relay
            .handle(&registered("bob"), ClientEvent::ChatSend(chat(Some("alice"), "hi")))
            .await;

        assert_eq!(outcome, RelayOutcome::Published { delivered: 1 });
        assert_eq!(
            next_event(&mut alice),
            Some(ServerEvent::ChatMessage(chat(Some("alice"), "hi")))
        );
        assert_eq!(next_event(&mut bob), None);
    }

    #[tokio::test]
    async fn test_chat_to_offline_user_is_silent() {
        let (relay, _router) = relay_with(FakeStore::default(), Duration::from_secs(1));

        let outcome = relay
            .handle(&registered("bob"), ClientEvent::ChatSend(chat(Some("alice"), "hi")))
            .await;

        assert_eq!(outcome, RelayOutcome::Published { delivered: 0 });
    }

    #[tokio::test]
    async fn test_missing_target_dropped() {
        let (relay, router) = relay_with(FakeStore::default(), Duration::from_secs(1));
        let mut alice = listen(&router, "alice");

        let outcome = relay
            .handle(&registered("bob"), ClientEvent::ChatSend(chat(None, "hi")))
            .await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::MissingTarget));

        let outcome = relay
            .handle(
                &registered("bob"),
                ClientEvent::Typing(object(json!({"to": ""}))),
            )
            .await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::MissingTarget));
        assert_eq!(next_event(&mut alice), None);
    }

    #[tokio::test]
    async fn test_chat_payload_forwarded_unchanged() {
        let (relay, router) = relay_with(FakeStore::default(), Duration::from_secs(1));
        let mut alice = listen(&router, "alice");
        let payload = object(json!({
            "to": "alice",
            "from": "bob",
            "text": null,
            "createdAt": 1700000000000u64,
            "meta": {"edited": false}
        }));

        relay
            .handle(&registered("bob"), ClientEvent::ChatSend(payload.clone()))
            .await;

        assert_eq!(next_event(&mut alice), Some(ServerEvent::ChatMessage(payload)));
    }

    #[tokio::test]
    async fn test_typing_events_forwarded_verbatim() {
        let (relay, router) = relay_with(FakeStore::default(), Duration::from_secs(1));
        let mut alice = listen(&router, "alice");
        let payload = object(json!({"to": "alice", "from": "bob", "at": 1700000000000u64}));

        relay
            .handle(&registered("bob"), ClientEvent::Typing(payload.clone()))
            .await;
        relay
            .handle(&registered("bob"), ClientEvent::StopTyping(payload.clone()))
            .await;

        assert_eq!(next_event(&mut alice), Some(ServerEvent::Typing(payload.clone())));
        assert_eq!(next_event(&mut alice), Some(ServerEvent::StopTyping(payload)));
    }

    #[tokio::test]
    async fn test_notification_enriched_and_delivered() {
        let store = FakeStore::default()
            .with_user("bob", "bobby", Some("bob.png"))
            .with_post("p1", Some("p1.jpg"));
        let (relay, router) = relay_with(store, Duration::from_secs(1));
        let mut alice = listen(&router, "alice");

        let outcome = relay
            .handle(&registered("bob"), ClientEvent::Notification(like("p1")))
            .await;
        assert_eq!(outcome, RelayOutcome::Published { delivered: 1 });

        match next_event(&mut alice) {
            Some(ServerEvent::Notification(n)) => {
                assert_eq!(n.sender_username.as_deref(), Some("bobby"));
                assert_eq!(n.sender_image.as_deref(), Some("bob.png"));
                assert_eq!(n.post_preview.as_deref(), Some("p1.jpg"));
                assert_eq!(n.base.kind.as_deref(), Some("LIKE"));
            }
            other => panic!("Expected notification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_notification_lookup_failure_drops_event() {
        let store = FakeStore {
            fail_posts: true,
            ..FakeStore::default()
        }
        .with_user("bob", "bobby", None);
        let (relay, router) = relay_with(store, Duration::from_secs(1));
        let mut alice = listen(&router, "alice");

        let outcome = relay
            .handle(&registered("bob"), ClientEvent::Notification(like("p1")))
            .await;

        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::EnrichmentFailed));
        assert_eq!(next_event(&mut alice), None);

        // The relay keeps working for the same sender afterwards
        let outcome = relay
            .handle(&registered("bob"), ClientEvent::ChatSend(chat(Some("alice"), "still here")))
            .await;
        assert_eq!(outcome, RelayOutcome::Published { delivered: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_timeout_drops_event() {
        let store = FakeStore {
            delay: Some(Duration::from_secs(30)),
            ..FakeStore::default()
        };
        let (relay, router) = relay_with(store, Duration::from_millis(200));
        let mut alice = listen(&router, "alice");

        let outcome = relay
            .handle(&registered("bob"), ClientEvent::Notification(like("p1")))
            .await;

        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::EnrichmentTimedOut));
        assert_eq!(next_event(&mut alice), None);
    }

    #[tokio::test]
    async fn test_notification_without_from_uses_connection_identity() {
        let store = FakeStore::default().with_user("bob", "bobby", None);
        let (relay, router) = relay_with(store, Duration::from_secs(1));
        let mut alice = listen(&router, "alice");
        let payload = NotificationPayload {
            to: Some("alice".to_string()),
            kind: Some("FOLLOW".to_string()),
            ..NotificationPayload::default()
        };

        relay
            .handle(&registered("bob"), ClientEvent::Notification(payload))
            .await;

        match next_event(&mut alice) {
            Some(ServerEvent::Notification(n)) => {
                assert_eq!(n.base.from.as_deref(), Some("bob"));
                assert_eq!(n.sender_username.as_deref(), Some("bobby"));
                assert_eq!(n.post_preview, None);
            }
            other => panic!("Expected notification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unregistered_source_dropped() {
        let (relay, _router) = relay_with(FakeStore::default(), Duration::from_secs(1));
        let (tx, _rx) = connection_channel();
        let conn = Connection::new(tx);

        let outcome = relay
            .handle(&conn, ClientEvent::ChatSend(chat(Some("alice"), "hi")))
            .await;
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::SourceNotRegistered));
    }
}
