//! Read-only row types for the enrichment lookups.
//! These correspond to the SQLite schema defined in migrations.rs.

/// Display data for a user, attached to notifications as sender attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub profile_image: Option<String>,
}

/// Preview data for a post referenced by a like/comment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPreview {
    pub id: String,
    pub image_url: Option<String>,
}
