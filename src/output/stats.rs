//! Aggregate report generation
//!
//! This module reads the tie-aware top poster / top post results from the
//! store and formats them for display.

use crate::storage::{AuthorStatistic, Store, Submission, TopResult};
use crate::HarvestError;

/// Aggregate snapshot of everything harvested so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Number of distinct submissions stored
    pub total_submissions: u64,

    /// Number of distinct authors seen
    pub total_authors: u64,

    /// Submission counts per forum, largest first
    pub by_forum: Vec<(String, u64)>,

    /// Every author tied at the highest post count
    pub top_posters: TopResult<AuthorStatistic>,

    /// Every submission tied at the highest upvote count
    pub top_posts: TopResult<Submission>,
}

/// Loads the report from storage
///
/// # Returns
///
/// * `Ok(HarvestReport)` - The report; empty stores yield `TopResult::NoData`
/// * `Err(HarvestError)` - A query failed
pub fn load_report(store: &dyn Store) -> Result<HarvestReport, HarvestError> {
    Ok(HarvestReport {
        total_submissions: store.count_submissions()?,
        total_authors: store.count_authors()?,
        by_forum: store.submissions_by_forum()?,
        top_posters: store.top_posters()?,
        top_posts: store.top_posts()?,
    })
}

/// Renders the report as plain text
pub fn format_report(report: &HarvestReport) -> String {
    let mut out = String::new();

    out.push_str("=== Harvest Statistics ===\n\n");
    out.push_str(&format!(
        "Submissions: {}\nAuthors: {}\n",
        report.total_submissions, report.total_authors
    ));

    if !report.by_forum.is_empty() {
        out.push_str("\nBy Forum:\n");
        for (forum, count) in &report.by_forum {
            out.push_str(&format!("  r/{}: {}\n", forum, count));
        }
    }

    out.push('\n');
    match &report.top_posters {
        TopResult::NoData => out.push_str("Top Poster: no data\n"),
        TopResult::Leaders { maximum, entries } => {
            out.push_str(&format!("Top Poster(s) with {} posts:\n", maximum));
            for stat in entries {
                out.push_str(&format!(
                    "  {:<24} posts {:>5}  upvotes {:>7}  comments {:>6}\n",
                    stat.author, stat.total_posts, stat.total_upvotes, stat.total_comments
                ));
            }
        }
    }

    out.push('\n');
    match &report.top_posts {
        TopResult::NoData => out.push_str("Top Post: no data\n"),
        TopResult::Leaders { maximum, entries } => {
            out.push_str(&format!("Top Post(s) with {} upvotes:\n", maximum));
            for post in entries {
                out.push_str(&format!(
                    "  [{}] r/{} by {}: {}\n",
                    post.external_id, post.forum, post.author, post.title
                ));
            }
        }
    }

    out
}

/// Prints the report to stdout
pub fn print_report(report: &HarvestReport) {
    print!("{}", format_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use chrono::Utc;

    fn submission(id: &str, author: &str, upvotes: i64) -> Submission {
        Submission {
            external_id: id.to_string(),
            forum: "news".to_string(),
            author: author.to_string(),
            title: format!("Title {}", id),
            body: String::new(),
            upvote_count: upvotes,
            comment_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_report() {
        let store = SqliteStore::new_in_memory().unwrap();
        let report = load_report(&store).unwrap();

        assert_eq!(report.total_submissions, 0);
        assert!(report.top_posters.is_empty());
        assert!(report.top_posts.is_empty());

        let text = format_report(&report);
        assert!(text.contains("Top Poster: no data"));
        assert!(text.contains("Top Post: no data"));
    }

    #[test]
    fn test_report_lists_all_tied_posts() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.persist(&submission("1", "a", 10)).unwrap();
        store.persist(&submission("2", "a", 5)).unwrap();
        store.persist(&submission("3", "b", 10)).unwrap();

        let report = load_report(&store).unwrap();
        assert_eq!(report.total_submissions, 3);
        assert_eq!(report.total_authors, 2);
        assert_eq!(report.by_forum, vec![("news".to_string(), 3)]);

        let text = format_report(&report);
        assert!(text.contains("Top Poster(s) with 2 posts"));
        assert!(text.contains("Top Post(s) with 10 upvotes"));
        assert!(text.contains("[1]"));
        assert!(text.contains("[3]"));
        assert!(!text.contains("[2]"));
    }

    #[test]
    fn test_reset_aggregates_clears_report() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.persist(&submission("1", "a", 10)).unwrap();

        crate::output::reset_aggregates(&store).unwrap();

        let report = load_report(&store).unwrap();
        assert_eq!(report.total_submissions, 0);
        assert_eq!(report.total_authors, 0);
        assert!(report.by_forum.is_empty());
    }
}
