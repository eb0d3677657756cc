//! v001 -- Initial schema creation.
//!
//! Creates the six tables: `users`, `communities`, `posts`, `comments`,
//! `votes` and `community_memberships`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    username   TEXT NOT NULL UNIQUE,
    email      TEXT NOT NULL UNIQUE,
    avatar     TEXT,
    created_at TEXT NOT NULL                  -- RFC-3339
);

-- ----------------------------------------------------------------
-- Communities (custom only; built-ins are never stored)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS communities (
    id           TEXT PRIMARY KEY NOT NULL,   -- slug
    name         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    icon         TEXT NOT NULL DEFAULT '',
    color        TEXT NOT NULL DEFAULT '',
    member_count INTEGER NOT NULL DEFAULT 0,
    is_default   INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_by   TEXT,                        -- users(id), not enforced
    created_at   TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    user_id     TEXT NOT NULL,                -- users(id), not enforced
    title       TEXT NOT NULL,
    content     TEXT,
    track_id    TEXT,
    song_title  TEXT NOT NULL,
    song_artist TEXT NOT NULL,
    song_album  TEXT,
    album_art   TEXT,
    preview_url TEXT,
    spotify_url TEXT,
    theme       TEXT,
    upvotes     INTEGER NOT NULL DEFAULT 0,
    downvotes   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_posts_theme ON posts(theme);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id          TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    post_id     TEXT NOT NULL,                -- FK -> posts(id)
    user_id     TEXT NOT NULL,
    content     TEXT NOT NULL,
    track_id    TEXT,
    song_title  TEXT NOT NULL,
    song_artist TEXT NOT NULL,
    song_album  TEXT,
    album_art   TEXT,
    preview_url TEXT,
    spotify_url TEXT,
    upvotes     INTEGER NOT NULL DEFAULT 0,
    downvotes   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,

    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at DESC);

-- ----------------------------------------------------------------
-- Votes: one row per (user, post)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS votes (
    user_id    TEXT NOT NULL,
    post_id    TEXT NOT NULL,                 -- FK -> posts(id)
    vote_type  TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_id, post_id),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Community memberships (presence only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS community_memberships (
    user_id      TEXT NOT NULL,
    community_id TEXT NOT NULL,
    created_at   TEXT NOT NULL,

    PRIMARY KEY (user_id, community_id)
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
