//! Typed views of the JSON rows exchanged with the store.
//!
//! `*Row` structs mirror a stored row; `New*Row` structs are what the client
//! sends on insert, leaving `id`, `created_at` and counters to the store.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use blam_shared::{Community, CommunityId, CommentId, PostId, Song, User, UserId, VoteType};

use crate::error::{Result, StoreError};
use crate::gateway::Row;

/// Encode a typed row as a JSON object.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Json(<serde_json::Error as serde::ser::Error>::custom(
            format!("expected a JSON object, got {other}"),
        ))),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRow {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            email: r.email,
            avatar: r.avatar,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewUserRow {
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// Song columns (shared by posts and comments)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongColumns {
    pub track_id: Option<String>,
    pub song_title: String,
    pub song_artist: String,
    pub song_album: Option<String>,
    pub album_art: Option<String>,
    pub preview_url: Option<String>,
    pub spotify_url: Option<String>,
}

impl SongColumns {
    /// Rebuild the song; rows written without a track id fall back to
    /// `fallback_id` (the owning row's id).
    pub fn to_song(&self, fallback_id: &str) -> Song {
        Song {
            id: self
                .track_id
                .clone()
                .unwrap_or_else(|| fallback_id.to_string()),
            title: self.song_title.clone(),
            artist: self.song_artist.clone(),
            album: self.song_album.clone(),
            duration_seconds: None,
            spotify_url: self.spotify_url.clone(),
            preview_url: self.preview_url.clone(),
            image_url: self.album_art.clone(),
        }
    }
}

impl From<&Song> for SongColumns {
    fn from(song: &Song) -> Self {
        Self {
            track_id: Some(song.id.clone()),
            song_title: song.title.clone(),
            song_artist: song.artist.clone(),
            song_album: song.album.clone(),
            album_art: song.image_url.clone(),
            preview_url: song.preview_url.clone(),
            spotify_url: song.spotify_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRow {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub content: Option<String>,
    #[serde(flatten)]
    pub song: SongColumns,
    pub theme: Option<CommunityId>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewPostRow {
    pub user_id: UserId,
    pub title: String,
    pub content: Option<String>,
    #[serde(flatten)]
    pub song: SongColumns,
    pub theme: Option<CommunityId>,
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Counter patch written after a vote.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PostCountersPatch {
    pub upvotes: i64,
    pub downvotes: i64,
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentRow {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    #[serde(flatten)]
    pub song: SongColumns,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewCommentRow {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    #[serde(flatten)]
    pub song: SongColumns,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRow {
    pub user_id: UserId,
    pub post_id: PostId,
    pub vote_type: VoteType,
}

// ---------------------------------------------------------------------------
// Communities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunityRow {
    pub id: CommunityId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub member_count: i64,
    pub is_default: bool,
    pub created_by: Option<UserId>,
}

impl From<CommunityRow> for Community {
    fn from(r: CommunityRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            icon: r.icon,
            color: r.color,
            member_count: r.member_count.max(0) as u64,
            is_custom: !r.is_default,
            created_by: r.created_by,
        }
    }
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipRow {
    pub user_id: UserId,
    pub community_id: CommunityId,
}
