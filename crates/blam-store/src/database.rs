//! SQLite-backed [`RemoteStore`].
//!
//! The [`SqliteStore`] owns a [`rusqlite::Connection`] behind a mutex and
//! guarantees that migrations are run before any other operation. SQL is
//! assembled from the fixed table schema only; every column named by a
//! caller is checked against [`Table::columns`] before it reaches a query.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::gateway::{ChangeEvent, ChangeKind, Filter, RemoteStore, Row, Subscription, Table};
use crate::migrations;

/// Buffered change events per table before slow subscribers start lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: HashMap<Table, broadcast::Sender<ChangeEvent>>,
}

impl SqliteStore {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/blam/blam.db`
    /// - macOS:   `~/Library/Application Support/app.blam.blam/blam.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\blam\blam\data\blam.db`
    pub fn open_default() -> Result<Self> {
        let project_dirs = ProjectDirs::from("app", "blam", "blam").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("blam.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database. Used by tests and demos.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;

        let changes = Table::ALL
            .iter()
            .map(|table| (*table, broadcast::channel(CHANGE_CHANNEL_CAPACITY).0))
            .collect();

        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn().path().map(PathBuf::from)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, table: Table, kind: ChangeKind) {
        if let Some(tx) = self.changes.get(&table) {
            // No receivers is fine: nobody is watching this table.
            let _ = tx.send(ChangeEvent { table, kind });
        }
    }

    fn query_sync(&self, table: Table, filter: &Filter) -> Result<Vec<Row>> {
        filter.validate(table)?;

        let (where_sql, mut values) = where_clause(table, filter);
        let mut sql = format!("SELECT * FROM {}{}", table.name(), where_sql);
        if let Some(order) = &filter.order {
            let dir = if order.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY {} {dir}, rowid {dir}", order.column));
        }
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", values.len() + 1));
            values.push(SqlValue::Integer(limit as i64));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params_from_iter(values), |row| read_row(table, &names, row))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn insert_sync(&self, table: Table, mut row: Row) -> Result<Row> {
        if table.has_generated_id() && !row.contains_key("id") {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if !row.contains_key("created_at") {
            row.insert("created_at".into(), Value::String(timestamp_now()));
        }

        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (column, value) in &row {
            table.check_column(column)?;
            columns.push(column.as_str());
            values.push(to_sql(value));
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table.name(),
            columns.join(", "),
            placeholders.join(", "),
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let stored = stmt
            .query_row(params_from_iter(values), |r| read_row(table, &names, r))
            .map_err(map_write_error)?;

        self.notify(table, ChangeKind::Insert);
        Ok(stored)
    }

    fn update_sync(&self, table: Table, key: &Filter, patch: Row) -> Result<()> {
        key.validate(table)?;
        if key.is_unconditional() {
            return Err(StoreError::Constraint(format!(
                "refusing unkeyed update on {table}"
            )));
        }
        if patch.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::with_capacity(patch.len());
        let mut values = Vec::with_capacity(patch.len() + key.eq.len());
        for (column, value) in &patch {
            table.check_column(column)?;
            values.push(to_sql(value));
            assignments.push(format!("{column} = ?{}", values.len()));
        }

        let mut conditions = Vec::with_capacity(key.eq.len());
        for (column, value) in &key.eq {
            values.push(to_sql(value));
            conditions.push(format!("{column} = ?{}", values.len()));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table.name(),
            assignments.join(", "),
            conditions.join(" AND "),
        );

        let affected = self
            .conn()
            .execute(&sql, params_from_iter(values))
            .map_err(map_write_error)?;

        if affected > 0 {
            self.notify(table, ChangeKind::Update);
        } else {
            tracing::debug!(table = %table, "update matched no rows");
        }
        Ok(())
    }

    fn delete_sync(&self, table: Table, key: &Filter) -> Result<()> {
        key.validate(table)?;
        if key.is_unconditional() {
            return Err(StoreError::Constraint(format!(
                "refusing unkeyed delete on {table}"
            )));
        }

        let (where_sql, values) = where_clause(table, key);
        let sql = format!("DELETE FROM {}{}", table.name(), where_sql);

        let affected = self
            .conn()
            .execute(&sql, params_from_iter(values))
            .map_err(map_write_error)?;

        if affected > 0 {
            self.notify(table, ChangeKind::Delete);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Row>> {
        self.query_sync(table, filter)
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        self.insert_sync(table, row)
    }

    async fn update(&self, table: Table, key: &Filter, patch: Row) -> Result<()> {
        self.update_sync(table, key, patch)
    }

    async fn delete(&self, table: Table, key: &Filter) -> Result<()> {
        self.delete_sync(table, key)
    }

    fn subscribe(&self, table: Table) -> Subscription {
        let rx = match self.changes.get(&table) {
            Some(tx) => tx.subscribe(),
            // Every table gets a sender in `from_connection`.
            None => broadcast::channel(1).1,
        };
        Subscription::new(table, rx)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// RFC 3339 with fixed microsecond precision, so string order is time order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn where_clause(table: Table, filter: &Filter) -> (String, Vec<SqlValue>) {
    if filter.eq.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut values = Vec::with_capacity(filter.eq.len());
    let mut conditions = Vec::with_capacity(filter.eq.len());
    for (column, value) in &filter.eq {
        values.push(to_sql(value));
        conditions.push(format!("{column} = ?{}", values.len()));
    }
    tracing::trace!(table = %table, conditions = conditions.len(), "built where clause");
    (format!(" WHERE {}", conditions.join(" AND ")), values)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Map a `rusqlite::Row` to a JSON row, restoring booleans.
fn read_row(table: Table, names: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (i, name) in names.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) if table.bool_columns().contains(&name.as_str()) => {
                Value::Bool(n != 0)
            }
            ValueRef::Integer(n) => Value::from(n),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(_) => Value::Null,
        };
        out.insert(name.clone(), value);
    }
    Ok(out)
}

fn map_write_error(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    async fn seeded() -> (SqliteStore, String) {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store
            .insert(
                Table::Users,
                row(json!({"username": "mira", "email": "mira@example.com"})),
            )
            .await
            .unwrap();
        let user_id = user["id"].as_str().unwrap().to_string();
        (store, user_id)
    }

    async fn insert_post(store: &SqliteStore, user_id: &str, title: &str) -> Row {
        store
            .insert(
                Table::Posts,
                row(json!({
                    "user_id": user_id,
                    "title": title,
                    "song_title": "Teardrop",
                    "song_artist": "Massive Attack",
                })),
            )
            .await
            .unwrap()
    }

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let store = SqliteStore::open_at(&path).expect("should open");
        assert!(store.path().is_some());
    }

    #[tokio::test]
    async fn test_insert_fills_server_defaults() {
        let (store, user_id) = seeded().await;
        let post = insert_post(&store, &user_id, "first").await;

        assert!(Uuid::parse_str(post["id"].as_str().unwrap()).is_ok());
        assert!(post["created_at"].is_string());
        assert_eq!(post["upvotes"], json!(0));
        assert_eq!(post["downvotes"], json!(0));
        assert_eq!(post["content"], Value::Null);
    }

    #[tokio::test]
    async fn test_query_newest_first() {
        let (store, user_id) = seeded().await;
        insert_post(&store, &user_id, "older").await;
        insert_post(&store, &user_id, "newer").await;

        let rows = store
            .query(Table::Posts, &Filter::all().newest_first())
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_vote_rows_unique_per_user_and_post() {
        let (store, user_id) = seeded().await;
        let post = insert_post(&store, &user_id, "p").await;
        let vote = row(json!({"user_id": user_id, "post_id": post["id"], "vote_type": "up"}));

        store.insert(Table::Votes, vote.clone()).await.unwrap();
        let err = store.insert(Table::Votes, vote).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_query_optional_not_found_is_none() {
        let (store, user_id) = seeded().await;
        let found = store
            .query_optional(Table::Votes, &Filter::all().eq("user_id", user_id))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete_by_key() {
        let (store, user_id) = seeded().await;
        let post = insert_post(&store, &user_id, "p").await;
        let key = Filter::all().eq("id", post["id"].clone());

        store
            .update(Table::Posts, &key, row(json!({"upvotes": 7})))
            .await
            .unwrap();
        let fetched = store.query_optional(Table::Posts, &key).await.unwrap().unwrap();
        assert_eq!(fetched["upvotes"], json!(7));

        store.delete(Table::Posts, &key).await.unwrap();
        assert!(store.query_optional(Table::Posts, &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unkeyed_writes_rejected() {
        let (store, _) = seeded().await;
        let err = store
            .update(Table::Posts, &Filter::all(), row(json!({"upvotes": 0})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.delete(Table::Posts, &Filter::all()).await.is_err());
    }

    #[tokio::test]
    async fn test_booleans_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(
                Table::Communities,
                row(json!({
                    "id": "focus-flow",
                    "name": "Focus Flow",
                    "description": "Deep work",
                    "icon": "🎧",
                    "color": "bg-slate-500",
                    "member_count": 1,
                    "is_default": false,
                })),
            )
            .await
            .unwrap();

        let custom = store
            .query(Table::Communities, &Filter::all().eq("is_default", false))
            .await
            .unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0]["is_default"], json!(false));
    }

    #[tokio::test]
    async fn test_writes_notify_subscribers() {
        let (store, user_id) = seeded().await;
        let mut sub = store.subscribe(Table::Posts);

        insert_post(&store, &user_id, "p").await;
        let event = sub.recv().await.unwrap();
        assert_eq!(event.table, Table::Posts);
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn test_deleting_post_cascades_to_votes_and_comments() {
        let (store, user_id) = seeded().await;
        let post = insert_post(&store, &user_id, "p").await;
        store
            .insert(
                Table::Votes,
                row(json!({"user_id": user_id, "post_id": post["id"], "vote_type": "down"})),
            )
            .await
            .unwrap();

        store
            .delete(Table::Posts, &Filter::all().eq("id", post["id"].clone()))
            .await
            .unwrap();
        let votes = store.query(Table::Votes, &Filter::all()).await.unwrap();
        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_column_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store
            .insert(Table::Users, row(json!({"username": "x", "email": "x@y", "pw": "1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }
}
