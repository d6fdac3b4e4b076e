//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Forum-Harvest database.

/// Schema version recorded in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Every submission ever seen, written once
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    forum TEXT NOT NULL,
    author TEXT NOT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    upvote_count INTEGER NOT NULL,
    comment_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_author ON submissions(author);
CREATE INDEX IF NOT EXISTS idx_submissions_upvotes ON submissions(upvote_count);
CREATE INDEX IF NOT EXISTS idx_submissions_forum ON submissions(forum);

-- Running totals per author, maintained by the ingest transaction
CREATE TABLE IF NOT EXISTS author_statistics (
    author TEXT PRIMARY KEY,
    total_posts INTEGER NOT NULL DEFAULT 0,
    total_upvotes INTEGER NOT NULL DEFAULT 0,
    total_comments INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_author_statistics_posts ON author_statistics(total_posts);

-- Latest API credential; older rows are removed when a new one is stored
CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_data TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["submissions", "author_statistics", "credentials"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_user_version_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
