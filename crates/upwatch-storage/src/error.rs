/// Errors that can occur within the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("storage: {entity} not found (key={key})")]
    NotFound { entity: &'static str, key: String },

    /// A time-range query was given a `from` later than its `to`.
    #[error("storage: invalid time range: from is after to")]
    InvalidTimeRange,

    /// An insert succeeded but the new row could not be read back, which
    /// should be unreachable under normal conditions.
    #[error("storage: insert of {entity} succeeded but the row could not be read back")]
    InsertReadback { entity: &'static str },

    /// An underlying SQLite error.
    #[error("storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
