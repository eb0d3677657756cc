//! The remote store contract.
//!
//! Every operation is asynchronous, may fail with a [`StoreError`] and may be
//! issued concurrently. Nothing here is transactional: a caller that needs
//! two writes (a vote row and its counters) issues two calls and handles the
//! case where only the first one lands.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};

/// A row as it crosses the gateway: column name to JSON value.
pub type Row = Map<String, Value>;

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Posts,
    Comments,
    Votes,
    Communities,
    CommunityMemberships,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Users,
        Table::Posts,
        Table::Comments,
        Table::Votes,
        Table::Communities,
        Table::CommunityMemberships,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Votes => "votes",
            Table::Communities => "communities",
            Table::CommunityMemberships => "community_memberships",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Users => &["id", "username", "email", "avatar", "created_at"],
            Table::Posts => &[
                "id",
                "user_id",
                "title",
                "content",
                "track_id",
                "song_title",
                "song_artist",
                "song_album",
                "album_art",
                "preview_url",
                "spotify_url",
                "theme",
                "upvotes",
                "downvotes",
                "created_at",
            ],
            Table::Comments => &[
                "id",
                "post_id",
                "user_id",
                "content",
                "track_id",
                "song_title",
                "song_artist",
                "song_album",
                "album_art",
                "preview_url",
                "spotify_url",
                "upvotes",
                "downvotes",
                "created_at",
            ],
            Table::Votes => &["user_id", "post_id", "vote_type", "created_at"],
            Table::Communities => &[
                "id",
                "name",
                "description",
                "icon",
                "color",
                "member_count",
                "is_default",
                "created_by",
                "created_at",
            ],
            Table::CommunityMemberships => &["user_id", "community_id", "created_at"],
        }
    }

    /// Whether the store assigns an `id` when an insert omits one.
    pub fn has_generated_id(&self) -> bool {
        !matches!(self, Table::Votes | Table::CommunityMemberships)
    }

    /// Columns holding booleans (stored as 0/1 by SQL backends).
    pub fn bool_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Communities => &["is_default"],
            _ => &[],
        }
    }

    pub fn check_column(&self, column: &str) -> Result<()> {
        if self.columns().contains(&column) {
            Ok(())
        } else {
            Err(StoreError::UnknownColumn {
                table: self.name(),
                column: column.to_string(),
            })
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Equality conditions (AND-ed) plus optional ordering and limit.
///
/// Used both as a query filter and as the key selecting rows to update or
/// delete; in the latter case ordering and limit are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Filter {
    /// Match every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending,
        });
        self
    }

    /// Order by `created_at`, newest first.
    pub fn newest_first(self) -> Self {
        self.order_by("created_at", true)
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn is_unconditional(&self) -> bool {
        self.eq.is_empty()
    }

    /// Check every referenced column against the table schema.
    pub fn validate(&self, table: Table) -> Result<()> {
        for (column, _) in &self.eq {
            table.check_column(column)?;
        }
        if let Some(order) = &self.order {
            table.check_column(&order.column)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Change notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Marker that something changed in a table. Consumers must not rely on
/// anything beyond the table name; the usual reaction is a full reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

/// Live subscription to one table's change events. Dropping it unsubscribes.
pub struct Subscription {
    table: Table,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(table: Table, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { table, rx }
    }

    /// Wait for the next event. Returns `None` once the store is gone.
    ///
    /// A lagged receiver still reports a change: missed events carry no
    /// information beyond "reload".
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(table = %self.table, skipped, "change subscription lagged");
                Some(ChangeEvent {
                    table: self.table,
                    kind: ChangeKind::Update,
                })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Row-level access to the remote relational store.
///
/// Implementations hold no client state; they are a conduit.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch all rows of `table` matching `filter`.
    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Row>>;

    /// Insert a row and return it as stored, with server defaults filled in.
    async fn insert(&self, table: Table, row: Row) -> Result<Row>;

    /// Apply `patch` to every row matching `key`.
    async fn update(&self, table: Table, key: &Filter, patch: Row) -> Result<()>;

    /// Delete every row matching `key`.
    async fn delete(&self, table: Table, key: &Filter) -> Result<()>;

    /// Subscribe to change events on `table`.
    fn subscribe(&self, table: Table) -> Subscription;

    /// Zero-or-one lookup. Finding nothing is `Ok(None)`, never an error.
    async fn query_optional(&self, table: Table, filter: &Filter) -> Result<Option<Row>> {
        let filter = filter.clone().limit(1);
        Ok(self.query(table, &filter).await?.into_iter().next())
    }
}
