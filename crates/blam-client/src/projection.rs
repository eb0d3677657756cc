//! Feed/community projection: the read model the UI renders.
//!
//! Holds posts and comments (newest first) joined with their authors, and
//! the custom communities. Two kinds of writers exist:
//!
//! - [`FeedProjection::reload`], which rebuilds everything from the store and
//!   is authoritative over any local patch applied before it resolved;
//! - the crate-internal patch methods used by the vote and mutation layers
//!   after a self-initiated write succeeded.
//!
//! Every change bumps a version published on a [`watch`] channel.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use blam_shared::{Comment, Community, CommunityId, Post, PostId, User, UserId, VoteType};
use blam_store::rows::{from_row, CommentRow, CommunityRow, PostRow, UserRow, VoteRow};
use blam_store::{Filter, RemoteStore, Row, Table};

use crate::error::Result;
use crate::optimistic::{reconcile, Draft};

#[derive(Debug, Default, Clone)]
struct FeedState {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    communities: Vec<Community>,
}

pub struct FeedProjection {
    state: RwLock<FeedState>,
    version: watch::Sender<u64>,
}

impl Default for FeedProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedProjection {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FeedState::default()),
            version: watch::Sender::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn all_posts(&self) -> Vec<Post> {
        self.read().posts.clone()
    }

    pub fn post_by_id(&self, id: PostId) -> Option<Post> {
        self.read().posts.iter().find(|p| p.id == id).cloned()
    }

    pub fn posts_by_theme(&self, theme: &str) -> Vec<Post> {
        self.read()
            .posts
            .iter()
            .filter(|p| p.theme.as_ref().map(CommunityId::as_str) == Some(theme))
            .cloned()
            .collect()
    }

    pub fn posts_by_user(&self, user_id: UserId) -> Vec<Post> {
        self.read()
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn comments_by_post_id(&self, post_id: PostId) -> Vec<Comment> {
        self.read()
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }

    /// Custom communities only; built-ins live in the static catalog.
    pub fn community_by_id(&self, id: &str) -> Option<Community> {
        self.read()
            .communities
            .iter()
            .find(|c| c.id.as_str() == id)
            .cloned()
    }

    pub fn custom_communities(&self) -> Vec<Community> {
        self.read().communities.clone()
    }

    /// Monotonic counter bumped on every change.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    // ------------------------------------------------------------------
    // Reload
    // ------------------------------------------------------------------

    /// Rebuild the projection from the store.
    ///
    /// On failure the last-known-good state is kept and the error returned.
    pub async fn reload(&self, store: &dyn RemoteStore, viewer: Option<UserId>) -> Result<()> {
        match fetch_state(store, viewer).await {
            Ok(fresh) => {
                debug!(
                    posts = fresh.posts.len(),
                    comments = fresh.comments.len(),
                    communities = fresh.communities.len(),
                    "feed reloaded"
                );
                *self.write() = fresh;
                self.bump();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "feed reload failed, keeping last known state");
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Patches (self-initiated writes that already succeeded remotely)
    // ------------------------------------------------------------------

    /// Set a post's counters and the viewer's vote in one step.
    pub(crate) fn apply_vote(
        &self,
        post_id: PostId,
        upvotes: u64,
        downvotes: u64,
        user_vote: Option<VoteType>,
    ) -> bool {
        let patched = {
            let mut state = self.write();
            match state.posts.iter_mut().find(|p| p.id == post_id) {
                Some(post) => {
                    post.upvotes = upvotes;
                    post.downvotes = downvotes;
                    post.user_vote = user_vote;
                    true
                }
                None => false,
            }
        };
        if patched {
            self.bump();
        }
        patched
    }

    pub(crate) fn settle_post(&self, local_id: Uuid, draft: Draft<Post>) {
        {
            let mut state = self.write();
            let posts = std::mem::take(&mut state.posts);
            state.posts = reconcile(posts, local_id, draft);
        }
        self.bump();
    }

    /// Fold a comment draft in. A newly confirmed comment bumps its post's
    /// `comment_count` by one; returns whether that happened.
    pub(crate) fn settle_comment(&self, local_id: Uuid, draft: Draft<Comment>) -> bool {
        let incremented = {
            let mut state = self.write();
            let target = match &draft {
                Draft::Confirmed(c) if !state.comments.iter().any(|x| x.id == c.id) => {
                    Some(c.post_id)
                }
                _ => None,
            };

            let comments = std::mem::take(&mut state.comments);
            state.comments = reconcile(comments, local_id, draft);

            match target.and_then(|id| state.posts.iter_mut().find(|p| p.id == id)) {
                Some(post) => {
                    post.comment_count += 1;
                    true
                }
                None => false,
            }
        };
        self.bump();
        incremented
    }

    pub(crate) fn remove_post(&self, id: PostId) -> bool {
        let removed = {
            let mut state = self.write();
            let before = state.posts.len();
            state.posts.retain(|p| p.id != id);
            state.comments.retain(|c| c.post_id != id);
            state.posts.len() != before
        };
        if removed {
            self.bump();
        }
        removed
    }

    pub(crate) fn add_community(&self, community: Community) {
        {
            let mut state = self.write();
            state.communities.retain(|c| c.id != community.id);
            state.communities.push(community);
        }
        self.bump();
    }

    fn read(&self) -> RwLockReadGuard<'_, FeedState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FeedState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

// ---------------------------------------------------------------------------
// Loading and joining
// ---------------------------------------------------------------------------

async fn fetch_state(store: &dyn RemoteStore, viewer: Option<UserId>) -> Result<FeedState> {
    let newest_first = Filter::all().newest_first();

    let post_rows: Vec<PostRow> =
        decode_rows(Table::Posts, store.query(Table::Posts, &newest_first).await?);
    let comment_rows: Vec<CommentRow> =
        decode_rows(Table::Comments, store.query(Table::Comments, &newest_first).await?);
    let community_rows: Vec<CommunityRow> = decode_rows(
        Table::Communities,
        store
            .query(Table::Communities, &Filter::all().eq("is_default", false))
            .await?,
    );
    let user_rows: Vec<UserRow> =
        decode_rows(Table::Users, store.query(Table::Users, &Filter::all()).await?);
    let vote_rows: Vec<VoteRow> = match viewer {
        Some(user_id) => decode_rows(
            Table::Votes,
            store
                .query(Table::Votes, &Filter::all().eq("user_id", user_id.to_string()))
                .await?,
        ),
        None => Vec::new(),
    };

    let authors: HashMap<UserId, User> = user_rows
        .into_iter()
        .map(|r| (r.id, User::from(r)))
        .collect();
    let votes: HashMap<PostId, VoteType> = vote_rows
        .into_iter()
        .map(|v| (v.post_id, v.vote_type))
        .collect();

    let comments: Vec<Comment> = comment_rows
        .into_iter()
        .filter_map(|row| match authors.get(&row.user_id) {
            Some(author) => Some(comment_from_row(row, author.clone())),
            None => {
                debug!(comment = %row.id, "dropping comment with unresolvable author");
                None
            }
        })
        .collect();

    let mut counts: HashMap<PostId, u64> = HashMap::new();
    for comment in &comments {
        *counts.entry(comment.post_id).or_default() += 1;
    }

    let posts = post_rows
        .into_iter()
        .filter_map(|row| match authors.get(&row.user_id) {
            Some(author) => {
                let count = counts.get(&row.id).copied().unwrap_or(0);
                let vote = votes.get(&row.id).copied();
                Some(post_from_row(row, author.clone(), count, vote))
            }
            None => {
                debug!(post = %row.id, "dropping post with unresolvable author");
                None
            }
        })
        .collect();

    Ok(FeedState {
        posts,
        comments,
        communities: community_rows.into_iter().map(Community::from).collect(),
    })
}

/// Decode each row on its own; a row that does not fit the schema is
/// skipped so that the rest of the table still loads.
fn decode_rows<T: DeserializeOwned>(table: Table, rows: Vec<Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match from_row(row) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(table = %table, id = %id, error = %e, "dropping undecodable row");
                    None
                }
            }
        })
        .collect()
}

pub(crate) fn post_from_row(
    row: PostRow,
    author: User,
    comment_count: u64,
    user_vote: Option<VoteType>,
) -> Post {
    let song = row.song.to_song(&row.id.to_string());
    Post {
        id: row.id,
        user_id: row.user_id,
        user: author,
        song,
        title: row.title,
        content: row.content,
        upvotes: row.upvotes.max(0) as u64,
        downvotes: row.downvotes.max(0) as u64,
        comment_count,
        created_at: row.created_at,
        user_vote,
        theme: row.theme,
    }
}

pub(crate) fn comment_from_row(row: CommentRow, author: User) -> Comment {
    let song = row.song.to_song(&row.id.to_string());
    Comment {
        id: row.id,
        post_id: row.post_id,
        user_id: row.user_id,
        user: author,
        song,
        content: row.content,
        upvotes: row.upvotes.max(0) as u64,
        downvotes: row.downvotes.max(0) as u64,
        created_at: row.created_at,
        user_vote: None,
    }
}
