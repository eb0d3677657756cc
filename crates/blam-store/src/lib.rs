//! # blam-store
//!
//! Remote store gateway for the Blam client.
//!
//! The [`RemoteStore`] trait is the only way the client core touches
//! persistent data: row-level query/insert/update/delete over a fixed set of
//! tables, plus per-table change notifications. Rows travel as JSON objects;
//! the [`rows`] module provides typed codecs for every table.
//!
//! [`SqliteStore`] is a self-contained backend built on SQLite. It assigns
//! server-side defaults (`id`, `created_at`) and broadcasts a change event
//! after every successful write.

pub mod database;
pub mod gateway;
pub mod migrations;
pub mod rows;

mod error;

pub use database::SqliteStore;
pub use error::{Result, StoreError};
pub use gateway::{ChangeEvent, ChangeKind, Filter, RemoteStore, Row, Subscription, Table};
