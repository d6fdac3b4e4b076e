//! Storage module for persisting harvested data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent submission ingest with per-author aggregate maintenance
//! - Tie-aware top poster / top post queries
//! - Persistence of the current API credential

mod schema;
mod sqlite;
mod traits;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens (or creates) the SQLite store at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::open(path)
}

/// A single submission harvested from a forum feed
///
/// Once stored a submission is never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Identifier assigned by the forum API; unique across the store
    pub external_id: String,
    pub forum: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub upvote_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Running totals for one author
///
/// Always equal to the counts and sums over that author's stored submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorStatistic {
    pub author: String,
    pub total_posts: i64,
    pub total_upvotes: i64,
    pub total_comments: i64,
}

/// What happened when a submission was handed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// First sighting: the submission was stored and its author's totals updated
    Inserted,
    /// The external id was already stored; nothing changed
    Duplicate,
}

impl PersistOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Result of a "find the maximum, then everything at the maximum" query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopResult<T> {
    /// Nothing has been stored yet
    NoData,
    /// Every entry sharing the maximum value, in a stable order
    Leaders { maximum: i64, entries: Vec<T> },
}

impl<T> TopResult<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoData)
    }

    pub fn maximum(&self) -> Option<i64> {
        match self {
            Self::NoData => None,
            Self::Leaders { maximum, .. } => Some(*maximum),
        }
    }

    pub fn entries(&self) -> &[T] {
        match self {
            Self::NoData => &[],
            Self::Leaders { entries, .. } => entries,
        }
    }
}
