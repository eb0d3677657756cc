use thiserror::Error;

use blam_shared::{PostId, ValidationError};
use blam_store::{StoreError, Table};

#[derive(Error, Debug)]
pub enum ClientError {
    /// A remote read or write failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Input rejected locally; nothing was sent to the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The write went through but the stored row could not be read back.
    /// Retrying would create a duplicate; the next reload skips the row.
    #[error("{table} row persisted but undecodable: {source}")]
    Unreadable {
        table: Table,
        #[source]
        source: StoreError,
    },

    /// Another vote on the same post is still outstanding.
    #[error("A vote on post {post_id} is already in flight")]
    ConcurrencyRejected { post_id: PostId },

    #[error("Track search failed: {0}")]
    Search(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// Errors that callers resolve locally (notice or silent no-op) rather
    /// than by undoing state.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ConcurrencyRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
