//! Per-forum crawl task
//!
//! Each task owns one forum's cursor and loops forever:
//! 1. wait for a rate limiter slot
//! 2. fetch the page after the current cursor
//! 3. hand each submission to the store, one at a time
//! 4. adopt the next cursor, even when the page was empty
//!
//! A failed fetch keeps the cursor, backs off and tries again. Only
//! cancellation or a credential failure ends the loop.
//!
//! A run of empty pages drops the cursor back to the start of the feed, so an
//! anchor that was removed upstream cannot hide new submissions forever.

use crate::crawler::paginator::{FetchError, Page, Paginator};
use crate::crawler::RateLimiter;
use crate::state::{CrawlState, Cursor};
use crate::storage::{PersistOutcome, Store, Submission};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Consecutive empty pages after which the cursor is reset to the feed start
pub const EMPTY_PAGES_BEFORE_REANCHOR: u32 = 30;

/// Counters kept by a crawl task over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub pages_fetched: u64,
    pub empty_pages: u64,
    pub fetch_failures: u64,
    pub new_submissions: u64,
    pub duplicates: u64,
    pub persist_failures: u64,
    pub reanchors: u64,
}

/// Why a crawl task stopped
#[derive(Debug)]
pub enum TaskExit {
    /// Shutdown was requested
    Cancelled,
    /// The credential was missing, expired or rejected
    CredentialFailure(FetchError),
}

/// Final state of a crawl task, returned from [`CrawlTask::run`]
#[derive(Debug)]
pub struct TaskOutcome {
    pub forum: String,
    pub stats: TaskStats,
    pub exit: TaskExit,
}

/// Summary of one successful fetch-and-deliver cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Crawls a single forum until cancelled
pub struct CrawlTask<P> {
    forum: String,
    paginator: Arc<P>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn Store>,
    backoff: Duration,
    cursor: Cursor,
    state: CrawlState,
    stats: TaskStats,
    empty_streak: u32,
}

impl<P: Paginator> CrawlTask<P> {
    pub fn new(
        forum: impl Into<String>,
        paginator: Arc<P>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn Store>,
        backoff: Duration,
    ) -> Self {
        Self {
            forum: forum.into(),
            paginator,
            limiter,
            store,
            backoff,
            cursor: Cursor::start(),
            state: CrawlState::Idle,
            stats: TaskStats::default(),
            empty_streak: 0,
        }
    }

    pub fn forum(&self) -> &str {
        &self.forum
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    /// Runs cycles until `shutdown` fires or the credential fails
    ///
    /// Cancellation only takes effect while waiting for a slot, a response
    /// or a backoff. Delivery of a fetched page is never interrupted.
    pub async fn run(mut self, shutdown: CancellationToken) -> TaskOutcome {
        tracing::info!(forum = %self.forum, "Crawl task started");

        let exit = loop {
            if shutdown.is_cancelled() {
                break TaskExit::Cancelled;
            }

            let cycle = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break TaskExit::Cancelled,
                result = self.run_once() => result,
            };

            match cycle {
                Ok(report) => {
                    if report.inserted > 0 {
                        tracing::info!(
                            forum = %self.forum,
                            new = report.inserted,
                            duplicates = report.duplicates,
                            "Stored new submissions"
                        );
                    }
                }
                Err(e) if e.is_credential() => {
                    tracing::error!(
                        forum = %self.forum,
                        "Credential failure, stopping crawl: {}",
                        e
                    );
                    break TaskExit::CredentialFailure(e);
                }
                Err(e) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break TaskExit::Cancelled,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                    tracing::debug!(forum = %self.forum, "Retrying after: {}", e);
                }
            }
        };

        // A cancelled await may have left us mid-cycle
        self.state = CrawlState::Idle;

        tracing::info!(
            forum = %self.forum,
            pages = self.stats.pages_fetched,
            new = self.stats.new_submissions,
            "Crawl task stopped"
        );

        TaskOutcome {
            forum: self.forum,
            stats: self.stats,
            exit,
        }
    }

    /// Performs one cycle: slot, fetch, deliver, advance
    ///
    /// On a fetch error the cursor is left untouched and the error returned.
    pub async fn run_once(&mut self) -> Result<CycleReport, FetchError> {
        self.limiter.acquire().await;

        self.enter(CrawlState::Fetching);
        let page = match self.paginator.fetch(&self.forum, &self.cursor).await {
            Ok(page) => page,
            Err(e) => {
                self.stats.fetch_failures += 1;
                if e.is_decode() {
                    tracing::warn!(forum = %self.forum, cursor = %self.cursor, "Undecodable page: {}", e);
                } else if !e.is_credential() {
                    tracing::warn!(forum = %self.forum, cursor = %self.cursor, "Page fetch failed: {}", e);
                }
                self.enter(CrawlState::Idle);
                return Err(e);
            }
        };

        self.enter(CrawlState::Delivering);
        let report = self.deliver(page);
        self.enter(CrawlState::Idle);

        Ok(report)
    }

    fn deliver(&mut self, page: Page) -> CycleReport {
        let mut report = CycleReport {
            fetched: page.submissions.len(),
            ..CycleReport::default()
        };

        self.stats.pages_fetched += 1;
        if page.submissions.is_empty() {
            self.stats.empty_pages += 1;
            tracing::debug!(forum = %self.forum, cursor = %self.cursor, "No new submissions");
        }

        for submission in &page.submissions {
            match self.store.persist(submission) {
                Ok(PersistOutcome::Inserted) => {
                    report.inserted += 1;
                    log_new_submission(submission);
                }
                Ok(PersistOutcome::Duplicate) => {
                    report.duplicates += 1;
                    tracing::trace!(forum = %self.forum, id = %submission.external_id, "Already stored");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        forum = %self.forum,
                        id = %submission.external_id,
                        "Dropping submission after storage failure: {}",
                        e
                    );
                }
            }
        }

        self.stats.new_submissions += report.inserted as u64;
        self.stats.duplicates += report.duplicates as u64;
        self.stats.persist_failures += report.failed as u64;

        self.cursor = page.next_cursor;
        self.track_empty_streak(report.fetched == 0);
        report
    }

    fn track_empty_streak(&mut self, empty: bool) {
        if !empty || self.cursor.is_start() {
            self.empty_streak = 0;
            return;
        }

        self.empty_streak += 1;
        if self.empty_streak >= EMPTY_PAGES_BEFORE_REANCHOR {
            tracing::debug!(
                forum = %self.forum,
                cursor = %self.cursor,
                "No new submissions after {} polls, restarting from the feed head",
                self.empty_streak
            );
            self.cursor = Cursor::start();
            self.empty_streak = 0;
            self.stats.reanchors += 1;
        }
    }

    fn enter(&mut self, next: CrawlState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid crawl state transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(forum = %self.forum, "{} -> {}", self.state, next);
        self.state = next;
    }
}

fn log_new_submission(submission: &Submission) {
    tracing::info!(
        "New post r/{} {:>8} upvotes {:>5} comments {:>4} author {:>20} title {:.40}",
        submission.forum,
        submission.external_id,
        submission.upvote_count,
        submission.comment_count,
        submission.author,
        submission.title
    );
}
