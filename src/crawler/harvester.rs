//! Harvester - runs one crawl task per forum
//!
//! The harvester is the surface the process boundary talks to:
//! - `start_crawling` spawns a task per forum, all sharing one rate limiter
//!   and one store
//! - `shutdown` stops new cycles, waits for every task to finish its current
//!   delivery, then reads the final aggregates
//! - `reset_aggregates` clears submissions and author totals together

use crate::auth::TokenGate;
use crate::config::Config;
use crate::crawler::paginator::{build_http_client, ForumApi, Paginator};
use crate::crawler::task::{CrawlTask, TaskExit, TaskOutcome};
use crate::crawler::RateLimiter;
use crate::output::{load_report, HarvestReport};
use crate::storage::Store;
use crate::HarvestError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// What `shutdown` hands back to the caller
#[derive(Debug)]
pub struct ShutdownReport {
    /// Aggregates read after every task stopped
    pub report: HarvestReport,
    /// One entry per task that ran to completion
    pub tasks: Vec<TaskOutcome>,
}

impl ShutdownReport {
    /// Forums whose task stopped because of the credential
    pub fn credential_failures(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.exit, TaskExit::CredentialFailure(_)))
            .map(|t| t.forum.as_str())
            .collect()
    }
}

/// Owns the crawl tasks for a set of forums
pub struct Harvester<P: Paginator + 'static> {
    paginator: Arc<P>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn Store>,
    backoff: Duration,
    shutdown: CancellationToken,
    credential_failed: CancellationToken,
    forums: HashSet<String>,
    tasks: Vec<JoinHandle<TaskOutcome>>,
}

impl Harvester<ForumApi> {
    /// Builds a harvester that talks to the configured forum API
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `store` - Store shared by every task
    /// * `gate` - Token gate holding the current credential
    /// * `limiter` - The process-wide rate limiter
    pub fn from_config(
        config: &Config,
        store: Arc<dyn Store>,
        gate: Arc<TokenGate>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.api)?;
        let api = ForumApi::new(client, &config.api.base_url, config.api.page_limit, gate)?;

        Ok(Self::new(
            Arc::new(api),
            limiter,
            store,
            config.api.retry_backoff(),
        ))
    }
}

impl<P: Paginator + 'static> Harvester<P> {
    pub fn new(
        paginator: Arc<P>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn Store>,
        backoff: Duration,
    ) -> Self {
        Self {
            paginator,
            limiter,
            store,
            backoff,
            shutdown: CancellationToken::new(),
            credential_failed: CancellationToken::new(),
            forums: HashSet::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawns a crawl task for every forum not already being crawled
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Number of tasks started
    /// * `Err(HarvestError::Config)` - A forum name is invalid; nothing was started
    pub fn start_crawling(&mut self, forums: &[String]) -> Result<usize, HarvestError> {
        for forum in forums {
            crate::config::validate_forum_name(forum)?;
        }

        let mut started = 0;
        for forum in forums {
            if !self.forums.insert(forum.clone()) {
                tracing::debug!("r/{} is already being crawled", forum);
                continue;
            }

            let task = CrawlTask::new(
                forum.clone(),
                Arc::clone(&self.paginator),
                Arc::clone(&self.limiter),
                Arc::clone(&self.store),
                self.backoff,
            );
            let shutdown = self.shutdown.clone();
            let credential_failed = self.credential_failed.clone();

            self.tasks.push(tokio::spawn(async move {
                let outcome = task.run(shutdown).await;
                if matches!(outcome.exit, TaskExit::CredentialFailure(_)) {
                    credential_failed.cancel();
                }
                outcome
            }));
            started += 1;
        }

        tracing::info!(
            "Crawling {} forums ({} newly started)",
            self.forums.len(),
            started
        );
        Ok(started)
    }

    /// Completes once any task has stopped because of the credential
    pub fn credential_failure(&self) -> WaitForCancellationFuture<'_> {
        self.credential_failed.cancelled()
    }

    pub fn has_credential_failure(&self) -> bool {
        self.credential_failed.is_cancelled()
    }

    pub fn active_forums(&self) -> usize {
        self.forums.len()
    }

    /// Stops every task, waits for them, then reports final aggregates
    ///
    /// The order is fixed: cancel, drain, report.
    pub async fn shutdown(self) -> Result<ShutdownReport, HarvestError> {
        tracing::info!("Stopping {} crawl tasks", self.tasks.len());
        self.shutdown.cancel();

        let mut tasks = Vec::with_capacity(self.tasks.len());
        for handle in self.tasks {
            match handle.await {
                Ok(outcome) => tasks.push(outcome),
                Err(e) => tracing::error!("Crawl task panicked: {}", e),
            }
        }

        let report = load_report(self.store.as_ref())?;
        Ok(ShutdownReport { report, tasks })
    }

    /// Clears all submissions and author totals
    pub fn reset_aggregates(&self) -> Result<(), HarvestError> {
        crate::output::reset_aggregates(self.store.as_ref())
    }
}
