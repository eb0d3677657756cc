use thiserror::Error;

/// Errors produced by the store gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A write violated a uniqueness, foreign-key or not-null constraint.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A row could not be encoded to, or decoded from, JSON.
    #[error("Row codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// A filter or row referenced a column the table does not have.
    #[error("Unknown column `{column}` on table `{table}`")]
    UnknownColumn { table: &'static str, column: String },

    /// The backend could not be reached or refused the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
