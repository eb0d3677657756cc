//! Community membership tracker.
//!
//! The joined set belongs to exactly one user. `switch_user` replaces it
//! wholesale from the `community_memberships` table; join/leave write through
//! to the store and touch the local set only after the write succeeded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use blam_shared::{CommunityId, UserId, ValidationError};
use blam_store::rows::{from_rows, to_row, MembershipRow};
use blam_store::{Filter, RemoteStore, StoreError, Table};

use crate::error::Result;
use crate::session::Session;

#[derive(Debug, Default)]
struct Memberships {
    user: Option<UserId>,
    joined: HashSet<CommunityId>,
}

pub struct MembershipTracker {
    store: Arc<dyn RemoteStore>,
    session: Arc<Session>,
    state: Mutex<Memberships>,
}

impl MembershipTracker {
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<Session>) -> Self {
        Self {
            store,
            session,
            state: Mutex::new(Memberships::default()),
        }
    }

    /// Replace the membership set with `user`'s. Never merges with the
    /// previous user's set.
    pub async fn switch_user(&self, user: Option<UserId>) -> Result<()> {
        {
            let mut state = self.lock();
            state.user = user;
            state.joined.clear();
        }
        let Some(user_id) = user else {
            return Ok(());
        };

        let filter = Filter::all().eq("user_id", user_id.to_string());
        let rows: Vec<MembershipRow> =
            from_rows(self.store.query(Table::CommunityMemberships, &filter).await?)?;

        let mut state = self.lock();
        // Another switch may have happened while the query was outstanding.
        if state.user != Some(user_id) {
            debug!(user = %user_id, "discarding memberships for a stale user");
            return Ok(());
        }
        state.joined = rows.into_iter().map(|r| r.community_id).collect();
        debug!(user = %user_id, count = state.joined.len(), "memberships loaded");
        Ok(())
    }

    /// Join a community. Joining twice is a no-op.
    pub async fn join(&self, community_id: &CommunityId) -> Result<()> {
        let user_id = self.current_user()?;
        if self.is_member(community_id.as_str()) {
            debug!(community = %community_id, "already a member");
            return Ok(());
        }

        let row = to_row(&MembershipRow {
            user_id,
            community_id: community_id.clone(),
        })?;
        match self.store.insert(Table::CommunityMemberships, row).await {
            Ok(_) => info!(user = %user_id, community = %community_id, "joined community"),
            // Row already present remotely: converge on joined.
            Err(StoreError::Constraint(_)) => {
                debug!(community = %community_id, "membership already stored")
            }
            Err(e) => {
                warn!(community = %community_id, error = %e, "join failed");
                return Err(e.into());
            }
        }

        self.update_set(user_id, |joined| {
            joined.insert(community_id.clone());
        });
        Ok(())
    }

    /// Leave a community. Leaving one you are not in is a no-op.
    pub async fn leave(&self, community_id: &CommunityId) -> Result<()> {
        let user_id = self.current_user()?;
        if !self.is_member(community_id.as_str()) {
            debug!(community = %community_id, "not a member");
            return Ok(());
        }

        let key = Filter::all()
            .eq("user_id", user_id.to_string())
            .eq("community_id", community_id.as_str());
        if let Err(e) = self.store.delete(Table::CommunityMemberships, &key).await {
            warn!(community = %community_id, error = %e, "leave failed");
            return Err(e.into());
        }
        info!(user = %user_id, community = %community_id, "left community");

        self.update_set(user_id, |joined| {
            joined.remove(community_id);
        });
        Ok(())
    }

    pub fn is_member(&self, community_id: &str) -> bool {
        self.lock()
            .joined
            .iter()
            .any(|c| c.as_str() == community_id)
    }

    /// Joined communities, sorted by id.
    pub fn joined(&self) -> Vec<CommunityId> {
        let mut ids: Vec<_> = self.lock().joined.iter().cloned().collect();
        ids.sort();
        ids
    }

    fn current_user(&self) -> Result<UserId> {
        Ok(self
            .session
            .user_id()
            .ok_or(ValidationError::NotAuthenticated)?)
    }

    fn update_set(&self, user_id: UserId, f: impl FnOnce(&mut HashSet<CommunityId>)) {
        let mut state = self.lock();
        if state.user == Some(user_id) {
            f(&mut state.joined);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Memberships> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
