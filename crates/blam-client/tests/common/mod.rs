//! Shared fixtures: a seeded in-memory store, store wrappers that fail or
//! pause chosen operations, and a harness wiring the client components
//! without the background sync loop.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use blam_client::directory::CommunityDirectory;
use blam_client::membership::MembershipTracker;
use blam_client::mutations::MutationLayer;
use blam_client::projection::FeedProjection;
use blam_client::search::TrackSearch;
use blam_client::session::Session;
use blam_client::votes::VoteAggregator;
use blam_shared::{PostId, Song, UserId};
use blam_store::{
    Filter, RemoteStore, Result as StoreResult, Row, SqliteStore, StoreError, Subscription, Table,
};

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

pub const MIRA: &str = "mira@example.com";
pub const JO: &str = "jo@example.com";

pub struct Seed {
    pub mira: UserId,
    pub jo: UserId,
    /// Jo's post in "chill" with 42 up / 3 down.
    pub post: PostId,
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

pub fn song(id: &str) -> Song {
    Song {
        id: id.into(),
        title: "Windowlicker".into(),
        artist: "Aphex Twin".into(),
        album: Some("Windowlicker".into()),
        ..Default::default()
    }
}

pub async fn insert_user(store: &dyn RemoteStore, username: &str, email: &str) -> UserId {
    let stored = store
        .insert(Table::Users, row(json!({"username": username, "email": email})))
        .await
        .unwrap();
    serde_json::from_value(stored["id"].clone()).unwrap()
}

pub async fn insert_post(
    store: &dyn RemoteStore,
    author: UserId,
    title: &str,
    upvotes: i64,
    downvotes: i64,
) -> PostId {
    let stored = store
        .insert(
            Table::Posts,
            row(json!({
                "user_id": author.to_string(),
                "title": title,
                "track_id": "trk-seed",
                "song_title": "Roygbiv",
                "song_artist": "Boards of Canada",
                "theme": "chill",
                "upvotes": upvotes,
                "downvotes": downvotes,
            })),
        )
        .await
        .unwrap();
    serde_json::from_value(stored["id"].clone()).unwrap()
}

pub async fn seed(store: &dyn RemoteStore) -> Seed {
    let mira = insert_user(store, "mira", MIRA).await;
    let jo = insert_user(store, "jo", JO).await;
    let post = insert_post(store, jo, "rainy sunday", 42, 3).await;
    Seed { mira, jo, post }
}

pub fn sqlite() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

/// Stored `(upvotes, downvotes)` of a post.
pub async fn stored_counters(store: &dyn RemoteStore, post: PostId) -> (u64, u64) {
    let row = store
        .query_optional(Table::Posts, &Filter::all().eq("id", post.to_string()))
        .await
        .unwrap()
        .unwrap();
    (
        row["upvotes"].as_u64().unwrap(),
        row["downvotes"].as_u64().unwrap(),
    )
}

pub async fn vote_rows(store: &dyn RemoteStore, user: UserId, post: PostId) -> Vec<Row> {
    store
        .query(
            Table::Votes,
            &Filter::all()
                .eq("user_id", user.to_string())
                .eq("post_id", post.to_string()),
        )
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Store wrappers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Query,
    Insert,
    Update,
    Delete,
}

/// Fails the configured `(op, table)` pairs with `StoreError::Unavailable`,
/// and can garble the rows returned by inserts that did go through.
pub struct FaultyStore {
    inner: Arc<dyn RemoteStore>,
    failing: Mutex<HashSet<(Op, Table)>>,
    garbled: Mutex<HashSet<Table>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            garbled: Mutex::new(HashSet::new()),
        }
    }

    /// Inserts into `table` persist, but hand back a row with a bad id.
    pub fn garble_inserts(&self, table: Table) {
        self.garbled.lock().unwrap().insert(table);
    }

    pub fn fail(&self, op: Op, table: Table) {
        self.failing.lock().unwrap().insert((op, table));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.garbled.lock().unwrap().clear();
    }

    fn check(&self, op: Op, table: Table) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(&(op, table)) {
            return Err(StoreError::Unavailable(format!("injected {op:?} failure on {table}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FaultyStore {
    async fn query(&self, table: Table, filter: &Filter) -> StoreResult<Vec<Row>> {
        self.check(Op::Query, table)?;
        self.inner.query(table, filter).await
    }

    async fn insert(&self, table: Table, row: Row) -> StoreResult<Row> {
        self.check(Op::Insert, table)?;
        let mut stored = self.inner.insert(table, row).await?;
        if self.garbled.lock().unwrap().contains(&table) {
            stored.insert("id".into(), json!("legacy-1"));
        }
        Ok(stored)
    }

    async fn update(&self, table: Table, key: &Filter, patch: Row) -> StoreResult<()> {
        self.check(Op::Update, table)?;
        self.inner.update(table, key, patch).await
    }

    async fn delete(&self, table: Table, key: &Filter) -> StoreResult<()> {
        self.check(Op::Delete, table)?;
        self.inner.delete(table, key).await
    }

    fn subscribe(&self, table: Table) -> Subscription {
        self.inner.subscribe(table)
    }
}

/// Holds the next matching `(op, table)` call before it reaches the inner
/// store until [`GatedStore::release`] is called.
pub struct GatedStore {
    inner: Arc<dyn RemoteStore>,
    gate: Mutex<Option<(Op, Table)>>,
    entered: Notify,
    released: Semaphore,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
            entered: Notify::new(),
            released: Semaphore::new(0),
        }
    }

    pub fn hold(&self, op: Op, table: Table) {
        *self.gate.lock().unwrap() = Some((op, table));
    }

    /// Resolves once a call is parked at the gate.
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.add_permits(1);
    }

    async fn checkpoint(&self, op: Op, table: Table) {
        let hit = {
            let mut gate = self.gate.lock().unwrap();
            if *gate == Some((op, table)) {
                *gate = None;
                true
            } else {
                false
            }
        };
        if hit {
            self.entered.notify_one();
            self.released.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl RemoteStore for GatedStore {
    async fn query(&self, table: Table, filter: &Filter) -> StoreResult<Vec<Row>> {
        self.checkpoint(Op::Query, table).await;
        self.inner.query(table, filter).await
    }

    async fn insert(&self, table: Table, row: Row) -> StoreResult<Row> {
        self.checkpoint(Op::Insert, table).await;
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: Table, key: &Filter, patch: Row) -> StoreResult<()> {
        self.checkpoint(Op::Update, table).await;
        self.inner.update(table, key, patch).await
    }

    async fn delete(&self, table: Table, key: &Filter) -> StoreResult<()> {
        self.checkpoint(Op::Delete, table).await;
        self.inner.delete(table, key).await
    }

    fn subscribe(&self, table: Table) -> Subscription {
        self.inner.subscribe(table)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Track search that never finds anything.
pub struct NoSearch;

#[async_trait]
impl TrackSearch for NoSearch {
    async fn search(&self, _query: &str, _limit: usize) -> blam_client::Result<Vec<Song>> {
        Ok(Vec::new())
    }
}

/// Client components over one store, without the sync loop, so reloads
/// only happen when a test asks for them.
pub struct Harness {
    pub store: Arc<dyn RemoteStore>,
    pub session: Arc<Session>,
    pub feed: Arc<FeedProjection>,
    pub votes: VoteAggregator,
    pub mutations: MutationLayer,
    pub memberships: MembershipTracker,
    pub directory: CommunityDirectory,
}

impl Harness {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let session = Arc::new(Session::new(store.clone()));
        let feed = Arc::new(FeedProjection::new());
        Self {
            votes: VoteAggregator::new(store.clone(), session.clone(), feed.clone()),
            mutations: MutationLayer::new(store.clone(), session.clone(), feed.clone()),
            memberships: MembershipTracker::new(store.clone(), session.clone()),
            directory: CommunityDirectory::new(feed.clone()),
            store,
            session,
            feed,
        }
    }

    pub async fn sign_in(&self, email: &str) {
        let user = self.session.sign_in(email).await.unwrap();
        self.memberships.switch_user(Some(user.id)).await.unwrap();
        self.reload().await;
    }

    pub async fn reload(&self) {
        self.feed
            .reload(self.store.as_ref(), self.session.user_id())
            .await
            .unwrap();
    }
}
