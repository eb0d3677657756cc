//! Domain model structs rendered by the UI layer.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a frontend as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::types::{CommentId, CommunityId, PostId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered user. The id never changes; username and avatar are editable
/// by their owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Song
// ---------------------------------------------------------------------------

/// Track metadata attached to posts and comments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Identifier assigned by the track search provider.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_seconds: Option<u32>,
    pub spotify_url: Option<String>,
    pub preview_url: Option<String>,
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

/// A themed community. Built-in entries come from the static catalog,
/// custom entries are persisted remotely with `is_custom = true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub member_count: u64,
    pub is_custom: bool,
    pub created_by: Option<UserId>,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl std::fmt::Display for VoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A post as rendered in the feed, joined with its author and counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    /// Author snapshot resolved at load time.
    pub user: User,
    pub song: Song,
    pub title: String,
    pub content: Option<String>,
    pub upvotes: u64,
    pub downvotes: u64,
    /// Derived from the comments collection, never stored remotely.
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    /// The viewing user's own vote, not a property of the post.
    pub user_vote: Option<VoteType>,
    pub theme: Option<CommunityId>,
}

impl Post {
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A song recommendation left on a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub user: User,
    pub song: Song,
    pub content: String,
    pub upvotes: u64,
    pub downvotes: u64,
    pub created_at: DateTime<Utc>,
    pub user_vote: Option<VoteType>,
}

impl Comment {
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// A post composed locally. `local_id` is generated by the caller and used to
/// reconcile the cached feed once the store answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub local_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub song: Option<Song>,
    pub theme: Option<CommunityId>,
}

impl PostDraft {
    pub fn new(title: impl Into<String>, song: Song) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            title: title.into(),
            content: None,
            song: Some(song),
            theme: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<CommunityId>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn validate(&self) -> Result<&Song, ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyField("title"));
        }
        self.song.as_ref().ok_or(ValidationError::MissingSong)
    }
}

/// A comment composed locally; always carries a song recommendation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub local_id: Uuid,
    pub post_id: PostId,
    pub content: String,
    pub song: Option<Song>,
}

impl CommentDraft {
    pub fn new(post_id: PostId, content: impl Into<String>, song: Song) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            post_id,
            content: content.into(),
            song: Some(song),
        }
    }

    pub fn validate(&self) -> Result<&Song, ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyField("content"));
        }
        self.song.as_ref().ok_or(ValidationError::MissingSong)
    }
}

/// A custom community about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityDraft {
    pub id: CommunityId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
}

impl CommunityDraft {
    /// Build a draft whose id is the slug of `name`.
    pub fn from_name(
        name: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: CommunityId::slug_from_name(&name),
            name,
            description: description.into(),
            icon: icon.into(),
            color: color.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() || self.id.as_str().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> Song {
        Song {
            id: "trk-1".into(),
            title: "Weightless".into(),
            artist: "Marconi Union".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_vote_type_wire_names() {
        assert_eq!(VoteType::Up.to_string(), "up");
        assert_eq!(serde_json::to_string(&VoteType::Down).unwrap(), "\"down\"");
        assert_eq!(
            serde_json::from_str::<VoteType>("\"up\"").unwrap(),
            VoteType::Up
        );
        assert!(serde_json::from_str::<VoteType>("\"sideways\"").is_err());
    }

    #[test]
    fn test_post_draft_requires_song_and_title() {
        let mut draft = PostDraft::new("Rainy day", song());
        assert!(draft.validate().is_ok());

        draft.song = None;
        assert_eq!(draft.validate(), Err(ValidationError::MissingSong));

        draft.title = "   ".into();
        assert_eq!(draft.validate(), Err(ValidationError::EmptyField("title")));
    }

    #[test]
    fn test_comment_draft_requires_content() {
        let draft = CommentDraft::new(PostId::new(), "", song());
        assert_eq!(draft.validate(), Err(ValidationError::EmptyField("content")));
    }

    #[test]
    fn test_community_draft_slug() {
        let draft = CommunityDraft::from_name("Focus Flow", "Deep work", "🎧", "bg-slate-500");
        assert_eq!(draft.id.as_str(), "focus-flow");
        assert!(draft.validate().is_ok());
    }
}
