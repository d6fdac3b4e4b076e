//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::auth::Credential;
use crate::storage::{AuthorStatistic, PersistOutcome, Submission, TopResult};
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// A duplicate submission is not an error; see [`PersistOutcome::Duplicate`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Implementations are shared between all crawl tasks, so every method takes
/// `&self` and must be safe to call concurrently. Author totals are only ever
/// written by [`Store::persist`] and [`Store::clear_all`].
pub trait Store: Send + Sync {
    // ===== Ingest =====

    /// Stores a submission if its external id is new
    ///
    /// On first sighting the submission row and the author's totals are
    /// written in one transaction. A known external id is a no-op.
    fn persist(&self, submission: &Submission) -> StorageResult<PersistOutcome>;

    /// Removes every submission and every author total in one transaction
    fn clear_all(&self) -> StorageResult<()>;

    // ===== Aggregate queries =====

    /// Every author whose post count equals the maximum post count
    fn top_posters(&self) -> StorageResult<TopResult<AuthorStatistic>>;

    /// Every submission whose upvote count equals the maximum upvote count
    fn top_posts(&self) -> StorageResult<TopResult<Submission>>;

    /// Gets the totals for one author
    fn author_statistic(&self, author: &str) -> StorageResult<Option<AuthorStatistic>>;

    /// Gets a stored submission by external id
    fn get_submission(&self, external_id: &str) -> StorageResult<Option<Submission>>;

    /// Counts stored submissions
    fn count_submissions(&self) -> StorageResult<u64>;

    /// Counts authors with at least one stored submission
    fn count_authors(&self) -> StorageResult<u64>;

    /// Submission counts per forum, largest first
    fn submissions_by_forum(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Credential =====

    /// Loads the most recently stored credential, if any
    fn load_credential(&self) -> StorageResult<Option<Credential>>;

    /// Replaces the stored credential
    fn save_credential(&self, credential: &Credential) -> StorageResult<()>;
}
