//! JSON event vocabulary exchanged over the relay socket.
//!
//! Every frame is a text message of the form `{"event": "<kind>", "data": {...}}`.
//! Relayed payloads keep any fields the relay does not know about, so clients can
//! extend them without a server change.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Events a client may send to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat:send")]
    ChatSend(RelayPayload),
    #[serde(rename = "typing")]
    Typing(RelayPayload),
    #[serde(rename = "stop:typing")]
    StopTyping(RelayPayload),
    #[serde(rename = "notification")]
    Notification(NotificationPayload),
}

impl ClientEvent {
    /// Decode a text frame. Unknown event kinds and malformed payloads are errors.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::ChatSend(_) => "chat:send",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::StopTyping(_) => "stop:typing",
            ClientEvent::Notification(_) => "notification",
        }
    }
}

/// Events the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Point-to-point snapshot sent once after a successful handshake.
    #[serde(rename = "presence:list")]
    PresenceList { online: Vec<String> },
    #[serde(rename = "presence:online")]
    PresenceOnline {
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(rename = "presence:offline")]
    PresenceOffline {
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(rename = "chat:message")]
    ChatMessage(RelayPayload),
    #[serde(rename = "typing")]
    Typing(RelayPayload),
    #[serde(rename = "stop:typing")]
    StopTyping(RelayPayload),
    #[serde(rename = "notification")]
    Notification(EnrichedNotification),
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::PresenceList { .. } => "presence:list",
            ServerEvent::PresenceOnline { .. } => "presence:online",
            ServerEvent::PresenceOffline { .. } => "presence:offline",
            ServerEvent::ChatMessage(_) => "chat:message",
            ServerEvent::Typing(_) => "typing",
            ServerEvent::StopTyping(_) => "stop:typing",
            ServerEvent::Notification(_) => "notification",
        }
    }

    /// Encode as a WebSocket text frame. Returns None if serialization fails.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::warn!(event = self.kind(), error = %e, "Failed to encode server event");
                None
            }
        }
    }
}

/// Chat and typing payload. The relay reads only `to`; the object is forwarded
/// as received, including explicit nulls and non-string values.
pub type RelayPayload = Map<String, Value>;

/// Target of a relayed payload: a non-empty string `to` field.
pub fn relay_target(payload: &RelayPayload) -> Option<&str> {
    payload
        .get("to")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
}

/// `notification` payload as sent by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Notification type, e.g. `LIKE`, `COMMENT`, `MESSAGE`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Field names the relay owns on a forwarded notification.
pub const ENRICHMENT_FIELDS: [&str; 3] = ["senderUsername", "senderImage", "postPreview"];

/// `notification` payload after enrichment. Missing lookups serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNotification {
    #[serde(flatten)]
    pub base: NotificationPayload,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub sender_image: Option<String>,
    #[serde(default)]
    pub post_preview: Option<String>,
}

/// Returns the target identity of a payload, treating an empty string as absent.
pub fn target_of(to: &Option<String>) -> Option<&str> {
    to.as_deref().filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_chat_send_keeps_unknown_fields() {
        let text = json!({
            "event": "chat:send",
            "data": {
                "conversationId": "c1",
                "from": "b",
                "to": "a",
                "text": "hi",
                "createdAt": "2024-01-01T00:00:00Z",
                "clientNonce": 7
            }
        })
        .to_string();

        match ClientEvent::decode(&text).unwrap() {
            ClientEvent::ChatSend(payload) => {
                assert_eq!(relay_target(&payload), Some("a"));
                assert_eq!(payload.get("conversationId"), Some(&json!("c1")));
                assert_eq!(payload.get("clientNonce"), Some(&json!(7)));
            }
            other => panic!("Expected ChatSend, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_event_kind() {
        let text = json!({"event": "presence:hack", "data": {}}).to_string();
        assert!(ClientEvent::decode(&text).is_err());
    }

    #[test]
    fn test_decode_typing_without_target() {
        let text = json!({"event": "typing", "data": {"from": "b"}}).to_string();
        match ClientEvent::decode(&text).unwrap() {
            ClientEvent::Typing(payload) => assert!(relay_target(&payload).is_none()),
            other => panic!("Expected Typing, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_send_accepts_non_string_fields() {
        let text = json!({
            "event": "chat:send",
            "data": {"to": "a", "createdAt": 1700000000000u64, "attachments": [1, 2]}
        })
        .to_string();

        match ClientEvent::decode(&text).unwrap() {
            ClientEvent::ChatSend(payload) => {
                assert_eq!(relay_target(&payload), Some("a"));
                assert_eq!(payload.get("createdAt"), Some(&json!(1700000000000u64)));
            }
            other => panic!("Expected ChatSend, got {:?}", other),
        }
    }

    #[test]
    fn test_chat_message_keeps_explicit_nulls() {
        let data = json!({"to": "a", "from": "b", "text": null});
        let text = json!({"event": "chat:send", "data": data}).to_string();
        let ClientEvent::ChatSend(payload) = ClientEvent::decode(&text).unwrap() else {
            panic!("Expected ChatSend");
        };

        let value = serde_json::to_value(ServerEvent::ChatMessage(payload)).unwrap();
        assert_eq!(value, json!({"event": "chat:message", "data": data}));
    }

    #[test]
    fn test_non_string_target_is_absent() {
        let payload = json!({"to": 42}).as_object().cloned().unwrap();
        assert_eq!(relay_target(&payload), None);
        let payload = json!({"to": ""}).as_object().cloned().unwrap();
        assert_eq!(relay_target(&payload), None);
    }

    #[test]
    fn test_presence_online_wire_shape() {
        let event = ServerEvent::PresenceOnline {
            user_id: "a".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"event": "presence:online", "data": {"userId": "a"}}));
    }

    #[test]
    fn test_enriched_notification_serializes_nulls() {
        let event = ServerEvent::Notification(EnrichedNotification {
            base: NotificationPayload {
                to: Some("a".to_string()),
                from: Some("b".to_string()),
                kind: Some("MESSAGE".to_string()),
                entity_id: None,
                extra: Map::new(),
            },
            sender_username: Some("bob".to_string()),
            sender_image: None,
            post_preview: None,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "notification",
                "data": {
                    "to": "a",
                    "from": "b",
                    "type": "MESSAGE",
                    "senderUsername": "bob",
                    "senderImage": null,
                    "postPreview": null
                }
            })
        );
    }

    #[test]
    fn test_empty_target_is_absent() {
        assert_eq!(target_of(&Some(String::new())), None);
        assert_eq!(target_of(&Some("a".to_string())), Some("a"));
        assert_eq!(target_of(&None), None);
    }
}
