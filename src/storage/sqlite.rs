//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::auth::Credential;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{AuthorStatistic, PersistOutcome, Submission, TopResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SUBMISSION_COLUMNS: &str =
    "external_id, forum, author, title, body, upvote_count, comment_count, created_at";

/// SQLite storage backend
///
/// The connection sits behind a mutex so one store can be shared by every
/// crawl task. Writes additionally run in `BEGIN IMMEDIATE` transactions, so
/// separate processes (or separate `SqliteStore`s opened on the same file)
/// serialize on the database write lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }
}

impl Store for SqliteStore {
    // ===== Ingest =====

    fn persist(&self, submission: &Submission) -> StorageResult<PersistOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let inserted = tx.execute(
            "INSERT INTO submissions
             (external_id, forum, author, title, body, upvote_count, comment_count, created_at, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(external_id) DO NOTHING",
            params![
                submission.external_id,
                submission.forum,
                submission.author,
                submission.title,
                submission.body,
                submission.upvote_count,
                submission.comment_count,
                submission.created_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            // Dropping the transaction rolls back the empty write.
            return Ok(PersistOutcome::Duplicate);
        }

        // Single statement read-increment-write, so concurrent writers for the
        // same author cannot lose an update.
        tx.execute(
            "INSERT INTO author_statistics (author, total_posts, total_upvotes, total_comments)
             VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(author) DO UPDATE SET
                 total_posts = total_posts + 1,
                 total_upvotes = total_upvotes + excluded.total_upvotes,
                 total_comments = total_comments + excluded.total_comments",
            params![
                submission.author,
                submission.upvote_count,
                submission.comment_count
            ],
        )?;

        tx.commit()?;
        Ok(PersistOutcome::Inserted)
    }

    fn clear_all(&self) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM submissions", [])?;
        tx.execute("DELETE FROM author_statistics", [])?;
        tx.commit()?;
        Ok(())
    }

    // ===== Aggregate queries =====

    fn top_posters(&self) -> StorageResult<TopResult<AuthorStatistic>> {
        let conn = self.conn()?;

        let maximum: Option<i64> = conn.query_row(
            "SELECT MAX(total_posts) FROM author_statistics",
            [],
            |row| row.get(0),
        )?;

        let Some(maximum) = maximum else {
            return Ok(TopResult::NoData);
        };

        let mut stmt = conn.prepare(
            "SELECT author, total_posts, total_upvotes, total_comments
             FROM author_statistics WHERE total_posts = ?1 ORDER BY author",
        )?;
        let entries = stmt
            .query_map(params![maximum], row_to_author_statistic)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TopResult::Leaders { maximum, entries })
    }

    fn top_posts(&self) -> StorageResult<TopResult<Submission>> {
        let conn = self.conn()?;

        let maximum: Option<i64> =
            conn.query_row("SELECT MAX(upvote_count) FROM submissions", [], |row| {
                row.get(0)
            })?;

        let Some(maximum) = maximum else {
            return Ok(TopResult::NoData);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM submissions WHERE upvote_count = ?1 ORDER BY external_id",
            SUBMISSION_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![maximum], row_to_submission)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TopResult::Leaders { maximum, entries })
    }

    fn author_statistic(&self, author: &str) -> StorageResult<Option<AuthorStatistic>> {
        let conn = self.conn()?;
        let statistic = conn
            .query_row(
                "SELECT author, total_posts, total_upvotes, total_comments
                 FROM author_statistics WHERE author = ?1",
                params![author],
                row_to_author_statistic,
            )
            .optional()?;
        Ok(statistic)
    }

    fn get_submission(&self, external_id: &str) -> StorageResult<Option<Submission>> {
        let conn = self.conn()?;
        let submission = conn
            .query_row(
                &format!(
                    "SELECT {} FROM submissions WHERE external_id = ?1",
                    SUBMISSION_COLUMNS
                ),
                params![external_id],
                row_to_submission,
            )
            .optional()?;
        Ok(submission)
    }

    fn count_submissions(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_authors(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM author_statistics", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    fn submissions_by_forum(&self) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT forum, COUNT(*) AS count FROM submissions
             GROUP BY forum ORDER BY count DESC, forum ASC",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    // ===== Credential =====

    fn load_credential(&self) -> StorageResult<Option<Credential>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT token_data FROM credentials ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_credential(&self, credential: &Credential) -> StorageResult<()> {
        let data = serde_json::to_string(credential)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM credentials", [])?;
        tx.execute(
            "INSERT INTO credentials (token_data, expires_at, created_at) VALUES (?1, ?2, ?3)",
            params![
                data,
                credential.expires_at.to_rfc3339(),
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn row_to_author_statistic(row: &Row<'_>) -> rusqlite::Result<AuthorStatistic> {
    Ok(AuthorStatistic {
        author: row.get(0)?,
        total_posts: row.get(1)?,
        total_upvotes: row.get(2)?,
        total_comments: row.get(3)?,
    })
}

fn row_to_submission(row: &Row<'_>) -> rusqlite::Result<Submission> {
    let created_at: String = row.get(7)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Submission {
        external_id: row.get(0)?,
        forum: row.get(1)?,
        author: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        upvote_count: row.get(5)?,
        comment_count: row.get(6)?,
        created_at,
    })
}
