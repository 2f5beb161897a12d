use async_trait::async_trait;
use rusqlite::OptionalExtension;

use super::models::{PostPreview, UserProfile};
use super::DbPool;
use crate::error::LookupError;
use crate::relay::enrich::ProfileStore;

/// SQLite-backed profile/post lookups. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteProfileStore {
    db: DbPool,
}

impl SqliteProfileStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, LookupError> {
        let db = self.db.clone();
        let uid = user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| LookupError::Unavailable(e.to_string()))?;
            let profile = conn
                .query_row(
                    "SELECT id, username, profile_image FROM users WHERE id = ?1",
                    rusqlite::params![uid],
                    |row| {
                        Ok(UserProfile {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            profile_image: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok::<_, LookupError>(profile)
        })
        .await?
    }

    async fn find_post(&self, post_id: &str) -> Result<Option<PostPreview>, LookupError> {
        let db = self.db.clone();
        let pid = post_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| LookupError::Unavailable(e.to_string()))?;
            let post = conn
                .query_row(
                    "SELECT id, image_url FROM posts WHERE id = ?1",
                    rusqlite::params![pid],
                    |row| {
                        Ok(PostPreview {
                            id: row.get(0)?,
                            image_url: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok::<_, LookupError>(post)
        })
        .await?
    }
}
