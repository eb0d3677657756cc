//! Optimistic mutation layer: post, comment and community creation, and post
//! deletion.
//!
//! Creations are keyed by the draft's caller-generated `local_id`. The cached
//! feed only ever holds confirmed rows; when a creation settles, the draft is
//! folded in through [`Draft`] so a failed attempt can never leave an orphan.

use std::sync::Arc;

use tracing::{error, info, warn};

use blam_shared::constants::NEW_COMMUNITY_MEMBER_COUNT;
use blam_shared::{
    Comment, CommentDraft, Community, CommunityDraft, Post, PostDraft, PostId, User,
    ValidationError,
};
use blam_store::rows::{
    from_row, to_row, CommentRow, CommunityRow, NewCommentRow, NewPostRow, PostRow, SongColumns,
};
use blam_store::{Filter, RemoteStore, Table};

use crate::error::{ClientError, Result};
use crate::optimistic::Draft;
use crate::projection::{comment_from_row, post_from_row, FeedProjection};
use crate::session::Session;

pub struct MutationLayer {
    store: Arc<dyn RemoteStore>,
    session: Arc<Session>,
    feed: Arc<FeedProjection>,
}

impl MutationLayer {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<Session>,
        feed: Arc<FeedProjection>,
    ) -> Self {
        Self {
            store,
            session,
            feed,
        }
    }

    /// Publish a post. The confirmed post is prepended to the feed.
    pub async fn create_post(&self, draft: PostDraft) -> Result<Post> {
        let author = self.author()?;
        let song = draft.validate()?;

        let row = to_row(&NewPostRow {
            user_id: author.id,
            title: draft.title.trim().to_string(),
            content: draft.content.clone().filter(|c| !c.trim().is_empty()),
            song: SongColumns::from(song),
            theme: draft.theme.clone(),
            upvotes: 0,
            downvotes: 0,
        })?;

        let inserted = match self.store.insert(Table::Posts, row).await {
            Ok(stored) => from_row::<PostRow>(stored).map_err(|e| {
                error!(local_id = %draft.local_id, error = %e, "post persisted but undecodable");
                ClientError::Unreadable {
                    table: Table::Posts,
                    source: e,
                }
            }),
            Err(e) => {
                warn!(local_id = %draft.local_id, error = %e, "post creation failed");
                Err(e.into())
            }
        };

        match inserted {
            Ok(stored) => {
                let post = post_from_row(stored, author, 0, None);
                self.feed
                    .settle_post(draft.local_id, Draft::Confirmed(post.clone()));
                info!(post_id = %post.id, theme = ?post.theme, "post created");
                Ok(post)
            }
            Err(e) => {
                self.feed
                    .settle_post(draft.local_id, Draft::Pending(draft.local_id));
                Err(e)
            }
        }
    }

    /// Add a song recommendation to a post. On success the post's comment
    /// count grows by exactly one.
    pub async fn create_comment(&self, draft: CommentDraft) -> Result<Comment> {
        let author = self.author()?;
        let song = draft.validate()?;

        let row = to_row(&NewCommentRow {
            post_id: draft.post_id,
            user_id: author.id,
            content: draft.content.trim().to_string(),
            song: SongColumns::from(song),
        })?;

        let inserted = match self.store.insert(Table::Comments, row).await {
            Ok(stored) => from_row::<CommentRow>(stored).map_err(|e| {
                error!(
                    local_id = %draft.local_id,
                    post_id = %draft.post_id,
                    error = %e,
                    "comment persisted but undecodable"
                );
                ClientError::Unreadable {
                    table: Table::Comments,
                    source: e,
                }
            }),
            Err(e) => {
                warn!(
                    local_id = %draft.local_id,
                    post_id = %draft.post_id,
                    error = %e,
                    "comment creation failed"
                );
                Err(e.into())
            }
        };

        match inserted {
            Ok(stored) => {
                let comment = comment_from_row(stored, author);
                let counted = self
                    .feed
                    .settle_comment(draft.local_id, Draft::Confirmed(comment.clone()));
                info!(
                    comment_id = %comment.id,
                    post_id = %comment.post_id,
                    counted,
                    "comment created"
                );
                Ok(comment)
            }
            Err(e) => {
                self.feed
                    .settle_comment(draft.local_id, Draft::Pending(draft.local_id));
                Err(e)
            }
        }
    }

    /// Delete a post remotely, then drop it (and its comments) from the feed.
    pub async fn delete_post(&self, post_id: PostId) -> Result<()> {
        let key = Filter::all().eq("id", post_id.to_string());
        if let Err(e) = self.store.delete(Table::Posts, &key).await {
            warn!(%post_id, error = %e, "post deletion failed");
            return Err(e.into());
        }
        self.feed.remove_post(post_id);
        info!(%post_id, "post deleted");
        Ok(())
    }

    /// Create a custom community owned by the current user.
    ///
    /// Id collisions are not checked here; the store's primary key rejects a
    /// duplicate custom id, and built-in ids shadow custom ones on lookup.
    pub async fn create_community(&self, draft: CommunityDraft) -> Result<Community> {
        let creator = self.author()?;
        draft.validate()?;

        let row = to_row(&CommunityRow {
            id: draft.id.clone(),
            name: draft.name.trim().to_string(),
            description: draft.description.clone(),
            icon: draft.icon.clone(),
            color: draft.color.clone(),
            member_count: NEW_COMMUNITY_MEMBER_COUNT as i64,
            is_default: false,
            created_by: Some(creator.id),
        })?;

        let stored = match self.store.insert(Table::Communities, row).await {
            Ok(stored) => from_row::<CommunityRow>(stored)?,
            Err(e) => {
                warn!(community = %draft.id, error = %e, "community creation failed");
                return Err(e.into());
            }
        };

        let community = Community::from(stored);
        self.feed.add_community(community.clone());
        info!(community = %community.id, "community created");
        Ok(community)
    }

    fn author(&self) -> Result<User> {
        Ok(self
            .session
            .current_user()
            .ok_or(ValidationError::NotAuthenticated)?)
    }
}
