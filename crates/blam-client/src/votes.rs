//! Vote aggregator.
//!
//! A vote is two independent remote writes: the `(user, post)` vote row, then
//! the post's counter columns. Nothing is patched locally until both have
//! succeeded. One vote per post may be outstanding at a time; the guard is
//! keyed by post, not by user.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use blam_shared::{PostId, UserId, ValidationError, VoteType};
use blam_store::rows::{from_row, to_row, PostCountersPatch, VoteRow};
use blam_store::{Filter, RemoteStore, Row, StoreError, Table};

use crate::error::{ClientError, Result};
use crate::projection::FeedProjection;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

/// What a vote request does given the caller's existing vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// No prior vote: insert one.
    Cast(VoteType),
    /// Same type again: toggle it off.
    Retract(VoteType),
    /// Opposite type: flip the existing vote.
    Switch { from: VoteType, to: VoteType },
}

impl VoteTransition {
    pub fn decide(existing: Option<VoteType>, requested: VoteType) -> Self {
        match existing {
            None => Self::Cast(requested),
            Some(current) if current == requested => Self::Retract(current),
            Some(current) => Self::Switch {
                from: current,
                to: requested,
            },
        }
    }

    /// Counter deltas as `(upvotes, downvotes)`.
    pub fn deltas(&self) -> (i64, i64) {
        fn unit(vote: VoteType, sign: i64) -> (i64, i64) {
            match vote {
                VoteType::Up => (sign, 0),
                VoteType::Down => (0, sign),
            }
        }
        match *self {
            Self::Cast(v) => unit(v, 1),
            Self::Retract(v) => unit(v, -1),
            Self::Switch { from, to } => {
                let (a, b) = unit(from, -1);
                let (c, d) = unit(to, 1);
                (a + c, b + d)
            }
        }
    }

    /// The caller's vote once the transition is applied.
    pub fn resulting_vote(&self) -> Option<VoteType> {
        match *self {
            Self::Cast(v) => Some(v),
            Self::Retract(_) => None,
            Self::Switch { to, .. } => Some(to),
        }
    }
}

/// Apply a delta to a counter, never going below zero.
pub fn apply_delta(count: u64, delta: i64) -> u64 {
    let next = count as i64 + delta;
    next.max(0) as u64
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteChange {
    pub post_id: PostId,
    pub transition: VoteTransition,
    pub upvotes: u64,
    pub downvotes: u64,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoUser,
    AlreadyInFlight { post_id: PostId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Applied(VoteChange),
    Skipped(SkipReason),
}

impl VoteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Treat a skipped vote as an error.
    pub fn into_result(self) -> Result<VoteChange> {
        match self {
            Self::Applied(change) => Ok(change),
            Self::Skipped(SkipReason::NoUser) => Err(ValidationError::NotAuthenticated.into()),
            Self::Skipped(SkipReason::AlreadyInFlight { post_id }) => {
                Err(ClientError::ConcurrencyRejected { post_id })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Marks a post as having a vote outstanding; released on drop.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<PostId>>,
    post_id: PostId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<PostId>>, post_id: PostId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(post_id);
        inserted.then_some(Self { set, post_id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.post_id);
    }
}

#[derive(Deserialize)]
struct Counters {
    upvotes: i64,
    downvotes: i64,
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct VoteAggregator {
    store: Arc<dyn RemoteStore>,
    session: Arc<Session>,
    feed: Arc<FeedProjection>,
    in_flight: Mutex<HashSet<PostId>>,
}

impl VoteAggregator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<Session>,
        feed: Arc<FeedProjection>,
    ) -> Self {
        Self {
            store,
            session,
            feed,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Cast, retract or switch the current user's vote on `post_id`.
    ///
    /// Returns `Skipped` without touching the store when nobody is signed in
    /// or a vote on the same post is still outstanding. Store failures are
    /// returned as errors and leave the cached feed untouched.
    pub async fn cast_vote(&self, post_id: PostId, vote_type: VoteType) -> Result<VoteOutcome> {
        let Some(user_id) = self.session.user_id() else {
            warn!(%post_id, "vote ignored: no signed-in user");
            return Ok(VoteOutcome::Skipped(SkipReason::NoUser));
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, post_id) else {
            debug!(%post_id, "vote ignored: another vote on this post is in flight");
            return Ok(VoteOutcome::Skipped(SkipReason::AlreadyInFlight { post_id }));
        };

        match self.persist(user_id, post_id, vote_type).await {
            Ok(change) => {
                self.feed
                    .apply_vote(post_id, change.upvotes, change.downvotes, change.user_vote);
                info!(
                    %post_id,
                    upvotes = change.upvotes,
                    downvotes = change.downvotes,
                    transition = ?change.transition,
                    "vote applied"
                );
                Ok(VoteOutcome::Applied(change))
            }
            Err(e) => {
                warn!(%post_id, error = %e, "vote failed");
                Err(e)
            }
        }
    }

    pub fn is_in_flight(&self, post_id: PostId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&post_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn persist(
        &self,
        user_id: UserId,
        post_id: PostId,
        requested: VoteType,
    ) -> Result<VoteChange> {
        let vote_key = Filter::all()
            .eq("user_id", user_id.to_string())
            .eq("post_id", post_id.to_string());

        let existing = match self.store.query_optional(Table::Votes, &vote_key).await? {
            Some(row) => Some(from_row::<VoteRow>(row)?.vote_type),
            None => None,
        };
        let transition = VoteTransition::decide(existing, requested);

        match transition {
            VoteTransition::Cast(vote_type) => {
                let row = to_row(&VoteRow {
                    user_id,
                    post_id,
                    vote_type,
                })?;
                self.store.insert(Table::Votes, row).await?;
            }
            VoteTransition::Retract(_) => {
                self.store.delete(Table::Votes, &vote_key).await?;
            }
            VoteTransition::Switch { to, .. } => {
                let mut patch = Row::new();
                patch.insert("vote_type".into(), json!(to.as_str()));
                self.store.update(Table::Votes, &vote_key, patch).await?;
            }
        }

        // Counters are read back only now, after the vote row changed.
        let post_key = Filter::all().eq("id", post_id.to_string());
        let current: Counters = from_row(
            self.store
                .query_optional(Table::Posts, &post_key)
                .await?
                .ok_or(StoreError::NotFound)?,
        )?;

        let (up_delta, down_delta) = transition.deltas();
        let upvotes = apply_delta(current.upvotes.max(0) as u64, up_delta);
        let downvotes = apply_delta(current.downvotes.max(0) as u64, down_delta);

        let patch = to_row(&PostCountersPatch {
            upvotes: upvotes as i64,
            downvotes: downvotes as i64,
        })?;
        self.store.update(Table::Posts, &post_key, patch).await?;

        Ok(VoteChange {
            post_id,
            transition,
            upvotes,
            downvotes,
            user_vote: transition.resulting_vote(),
        })
    }
}
