//! Integration tests for ingest and aggregate queries
//!
//! These tests run against file-backed SQLite databases and exercise the
//! store from several writers at once.

use chrono::{TimeZone, Utc};
use forum_harvest::storage::{PersistOutcome, SqliteStore, Store, Submission, TopResult};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn submission(id: &str, author: &str, upvotes: i64, comments: i64) -> Submission {
    Submission {
        external_id: id.to_string(),
        forum: "news".to_string(),
        author: author.to_string(),
        title: format!("Submission {}", id),
        body: String::new(),
        upvote_count: upvotes,
        comment_count: comments,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    }
}

/// Every author's totals must equal the sums over their stored submissions
fn assert_totals_derivable(store: &SqliteStore, persisted: &[Submission]) {
    let mut expected: HashMap<&str, (i64, i64, i64)> = HashMap::new();
    let mut seen = std::collections::HashSet::new();
    for s in persisted {
        if !seen.insert(s.external_id.as_str()) {
            continue;
        }
        let entry = expected.entry(s.author.as_str()).or_default();
        entry.0 += 1;
        entry.1 += s.upvote_count;
        entry.2 += s.comment_count;
    }

    assert_eq!(store.count_authors().unwrap(), expected.len() as u64);
    for (author, (posts, upvotes, comments)) in expected {
        let stat = store.author_statistic(author).unwrap().unwrap();
        assert_eq!(stat.total_posts, posts, "posts for {}", author);
        assert_eq!(stat.total_upvotes, upvotes, "upvotes for {}", author);
        assert_eq!(stat.total_comments, comments, "comments for {}", author);
    }
}

#[test]
fn test_ties_reported_in_full() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("harvest.db")).unwrap();

    let batch = vec![
        submission("1", "a", 10, 0),
        submission("2", "a", 5, 0),
        submission("3", "b", 10, 0),
    ];
    for s in &batch {
        assert_eq!(store.persist(s).unwrap(), PersistOutcome::Inserted);
    }

    match store.top_posters().unwrap() {
        TopResult::Leaders { maximum, entries } => {
            assert_eq!(maximum, 2);
            let authors: Vec<_> = entries.iter().map(|e| e.author.as_str()).collect();
            assert_eq!(authors, vec!["a"]);
        }
        TopResult::NoData => panic!("expected a top poster"),
    }

    match store.top_posts().unwrap() {
        TopResult::Leaders { maximum, entries } => {
            assert_eq!(maximum, 10);
            let ids: Vec<_> = entries.iter().map(|e| e.external_id.as_str()).collect();
            assert_eq!(ids, vec!["1", "3"]);
        }
        TopResult::NoData => panic!("expected top posts"),
    }

    assert_totals_derivable(&store, &batch);
}

#[test]
fn test_replaying_a_batch_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("harvest.db")).unwrap();

    let batch = vec![
        submission("x1", "carol", 3, 1),
        submission("x2", "dave", 8, 2),
        submission("x3", "carol", 1, 0),
    ];
    for s in &batch {
        store.persist(s).unwrap();
    }
    let before = (store.top_posters().unwrap(), store.top_posts().unwrap());

    for s in &batch {
        assert_eq!(store.persist(s).unwrap(), PersistOutcome::Duplicate);
    }

    assert_eq!(store.count_submissions().unwrap(), 3);
    assert_eq!((store.top_posters().unwrap(), store.top_posts().unwrap()), before);
    assert_totals_derivable(&store, &batch);
}

#[test]
fn test_duplicate_with_different_fields_keeps_first() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("harvest.db")).unwrap();

    store.persist(&submission("same", "erin", 1, 1)).unwrap();
    let outcome = store.persist(&submission("same", "erin", 500, 40)).unwrap();

    assert_eq!(outcome, PersistOutcome::Duplicate);
    let stored = store.get_submission("same").unwrap().unwrap();
    assert_eq!(stored.upvote_count, 1);

    let stat = store.author_statistic("erin").unwrap().unwrap();
    assert_eq!(stat.total_posts, 1);
    assert_eq!(stat.total_upvotes, 1);
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");

    {
        let store = SqliteStore::open(&db).unwrap();
        store.persist(&submission("keep", "frank", 2, 2)).unwrap();
    }

    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(store.count_submissions().unwrap(), 1);
    assert_eq!(
        store.persist(&submission("keep", "frank", 2, 2)).unwrap(),
        PersistOutcome::Duplicate
    );
}

#[test]
fn test_clear_all_then_reingest() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("harvest.db")).unwrap();

    store.persist(&submission("1", "a", 10, 0)).unwrap();
    store.clear_all().unwrap();

    assert!(store.top_posters().unwrap().is_empty());
    assert!(store.top_posts().unwrap().is_empty());

    // Cleared ids are new again
    assert_eq!(
        store.persist(&submission("1", "a", 10, 0)).unwrap(),
        PersistOutcome::Inserted
    );
    assert_eq!(store.author_statistic("a").unwrap().unwrap().total_posts, 1);
}

#[test]
fn test_concurrent_writers_shared_handle() {
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 25;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("harvest.db")).unwrap());

    std::thread::scope(|scope| {
        for w in 0..WRITERS {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..PER_WRITER {
                    let s = submission(&format!("w{}-{}", w, i), "busy_author", 1, 2);
                    store.persist(&s).unwrap();
                }
            });
        }
    });

    let stat = store.author_statistic("busy_author").unwrap().unwrap();
    assert_eq!(stat.total_posts, (WRITERS * PER_WRITER) as i64);
    assert_eq!(stat.total_upvotes, (WRITERS * PER_WRITER) as i64);
    assert_eq!(stat.total_comments, (WRITERS * PER_WRITER * 2) as i64);
}

#[test]
fn test_concurrent_writers_separate_connections() {
    const WRITERS: usize = 4;
    const SUBMISSIONS: usize = 40;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("harvest.db");

    // Every writer tries every id; each id must be counted once
    let stores: Vec<SqliteStore> = (0..WRITERS)
        .map(|_| SqliteStore::open(&db).unwrap())
        .collect();

    let inserted: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = stores
            .iter()
            .map(|store| {
                scope.spawn(move || {
                    let mut inserted = 0;
                    for i in 0..SUBMISSIONS {
                        let author = if i % 2 == 0 { "even" } else { "odd" };
                        let s = submission(&format!("shared-{}", i), author, i as i64, 1);
                        if store.persist(&s).unwrap().is_inserted() {
                            inserted += 1;
                        }
                    }
                    inserted
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(inserted, SUBMISSIONS);

    let reader = SqliteStore::open(&db).unwrap();
    assert_eq!(reader.count_submissions().unwrap(), SUBMISSIONS as u64);

    let all: Vec<_> = (0..SUBMISSIONS)
        .map(|i| {
            let author = if i % 2 == 0 { "even" } else { "odd" };
            submission(&format!("shared-{}", i), author, i as i64, 1)
        })
        .collect();
    assert_totals_derivable(&reader, &all);

    match reader.top_posts().unwrap() {
        TopResult::Leaders { maximum, entries } => {
            assert_eq!(maximum, (SUBMISSIONS - 1) as i64);
            assert_eq!(entries.len(), 1);
        }
        TopResult::NoData => panic!("expected a top post"),
    }
}
