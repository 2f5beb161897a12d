//! Notification enrichment against the external profile/post store.

use async_trait::async_trait;

use crate::db::models::{PostPreview, UserProfile};
use crate::error::LookupError;
use crate::ws::protocol::{EnrichedNotification, NotificationPayload, ENRICHMENT_FIELDS};

/// Read-only lookups the relay needs from the data store.
///
/// `Ok(None)` means the record does not exist; `Err` means the store could not
/// answer.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, LookupError>;

    async fn find_post(&self, post_id: &str) -> Result<Option<PostPreview>, LookupError>;
}

/// Notification types that point at a post and carry a preview image.
pub fn references_post(kind: &str) -> bool {
    matches!(kind, "LIKE" | "COMMENT")
}

/// Look up sender attribution (and a post preview when the type references a
/// post) and merge it into the payload.
///
/// `sender_id` is the identity used for the user lookup. Any store error aborts
/// the whole enrichment.
pub async fn enrich_notification(
    store: &dyn ProfileStore,
    sender_id: &str,
    mut payload: NotificationPayload,
) -> Result<EnrichedNotification, LookupError> {
    let sender = store.find_user(sender_id).await?;

    let post_preview = match (payload.kind.as_deref(), payload.entity_id.as_deref()) {
        (Some(kind), Some(entity_id)) if references_post(kind) && !entity_id.is_empty() => store
            .find_post(entity_id)
            .await?
            .and_then(|post| post.image_url),
        _ => None,
    };

    // Relay-owned fields always come from the store, never from the client
    for field in ENRICHMENT_FIELDS {
        payload.extra.remove(field);
    }

    let (sender_username, sender_image) = match sender {
        Some(profile) => (Some(profile.username), profile.profile_image),
        None => (None, None),
    };

    Ok(EnrichedNotification {
        base: payload,
        sender_username,
        sender_image,
        post_preview,
    })
}
