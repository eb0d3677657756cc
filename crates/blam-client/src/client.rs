//! `BlamClient`: wires the session, projection, vote aggregator, mutation
//! layer, membership tracker, community directory, track search and sync
//! loop around one store handle.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use blam_shared::User;
use blam_store::RemoteStore;

use crate::config::ClientConfig;
use crate::directory::CommunityDirectory;
use crate::error::Result;
use crate::membership::MembershipTracker;
use crate::mutations::MutationLayer;
use crate::projection::FeedProjection;
use crate::search::{DebouncedSearch, HttpTrackSearch, TrackSearch};
use crate::session::Session;
use crate::sync::{spawn_sync_loop, SyncHandle};
use crate::votes::VoteAggregator;

pub struct BlamClient {
    config: ClientConfig,
    store: Arc<dyn RemoteStore>,
    session: Arc<Session>,
    feed: Arc<FeedProjection>,
    votes: VoteAggregator,
    mutations: MutationLayer,
    memberships: MembershipTracker,
    directory: CommunityDirectory,
    search: DebouncedSearch,
    sync: Mutex<Option<SyncHandle>>,
}

impl BlamClient {
    /// Start a client against `store`, searching tracks over HTTP.
    pub async fn start(store: Arc<dyn RemoteStore>, config: ClientConfig) -> Result<Self> {
        let backend = Arc::new(HttpTrackSearch::new(config.search_url.clone())?);
        Self::start_with_search(store, config, backend).await
    }

    /// Start a client with a caller-provided track search backend.
    ///
    /// Spawns the sync loop and performs the initial load. A failed initial
    /// load is logged and leaves an empty feed; the next change notification
    /// or an explicit [`reload`](Self::reload) retries it.
    pub async fn start_with_search(
        store: Arc<dyn RemoteStore>,
        config: ClientConfig,
        backend: Arc<dyn TrackSearch>,
    ) -> Result<Self> {
        let session = Arc::new(Session::new(store.clone()));
        let feed = Arc::new(FeedProjection::new());

        let client = Self {
            votes: VoteAggregator::new(store.clone(), session.clone(), feed.clone()),
            mutations: MutationLayer::new(store.clone(), session.clone(), feed.clone()),
            memberships: MembershipTracker::new(store.clone(), session.clone()),
            directory: CommunityDirectory::new(feed.clone()),
            search: DebouncedSearch::new(backend, config.search_debounce, config.search_limit),
            sync: Mutex::new(Some(spawn_sync_loop(
                store.clone(),
                feed.clone(),
                session.clone(),
                config.reload_coalesce,
            ))),
            config,
            store,
            session,
            feed,
        };

        let _ = client.reload().await;
        info!("client started");
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn feed(&self) -> &FeedProjection {
        &self.feed
    }

    pub fn votes(&self) -> &VoteAggregator {
        &self.votes
    }

    pub fn mutations(&self) -> &MutationLayer {
        &self.mutations
    }

    pub fn memberships(&self) -> &MembershipTracker {
        &self.memberships
    }

    pub fn directory(&self) -> &CommunityDirectory {
        &self.directory
    }

    pub fn search(&self) -> &DebouncedSearch {
        &self.search
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    /// Rebuild the feed for the current viewer.
    pub async fn reload(&self) -> Result<()> {
        self.feed
            .reload(self.store.as_ref(), self.session.user_id())
            .await
    }

    pub async fn sign_up(&self, username: &str, email: &str, avatar: Option<&str>) -> Result<User> {
        let user = self.session.sign_up(username, email, avatar).await?;
        self.user_changed().await;
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str) -> Result<User> {
        let user = self.session.sign_in(email).await?;
        self.user_changed().await;
        Ok(user)
    }

    pub async fn sign_out(&self) {
        self.session.sign_out();
        self.user_changed().await;
    }

    /// Update the signed-in profile; the feed is reloaded so author
    /// snapshots pick up the change.
    pub async fn update_profile(
        &self,
        username: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<User> {
        let user = self.session.update_profile(username, avatar).await?;
        let _ = self.reload().await;
        Ok(user)
    }

    /// Stop the sync loop. The client stays usable for explicit calls.
    pub async fn shutdown(&self) {
        let handle = self
            .sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            info!("client shut down");
        }
    }

    async fn user_changed(&self) {
        let user = self.session.user_id();
        if let Err(e) = self.memberships.switch_user(user).await {
            warn!(error = %e, "failed to load memberships");
        }
        let _ = self.reload().await;
    }
}
