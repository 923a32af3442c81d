use thiserror::Error;

use crate::store::SequenceKey;

/// Errors that can occur while assigning sequence numbers.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// No sequence row exists for the key. Rows are provisioned out-of-band,
    /// so this is never retried.
    #[error("sequence not found for {0}")]
    NotFound(SequenceKey),

    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("sequence {key} still contended after {attempts} attempts")]
    Contention { key: SequenceKey, attempts: u32 },

    /// Document type is required.
    #[error("document_type is required")]
    DocumentTypeRequired,

    /// The counter cannot be advanced further.
    #[error("sequence {0} is exhausted")]
    Exhausted(SequenceKey),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl SequenceError {
    /// Returns true if the caller may retry the whole request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SequenceError::Contention { .. })
    }
}

/// Result type for sequence operations.
pub type Result<T> = std::result::Result<T, SequenceError>;
