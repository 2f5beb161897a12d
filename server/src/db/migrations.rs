use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking; no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: lookup tables for notification enrichment

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    profile_image TEXT
);

CREATE TABLE posts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    image_url TEXT
);

CREATE INDEX idx_posts_user_id ON posts(user_id);
",
    )])
}
