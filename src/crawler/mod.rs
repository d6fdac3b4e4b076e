//! Crawler module for harvesting forum feeds
//!
//! This module contains the core crawling logic, including:
//! - The process-wide rate limiter
//! - Paginated, authenticated page fetching and decoding
//! - The per-forum crawl task loop
//! - Overall harvest coordination and shutdown

mod harvester;
mod paginator;
mod rate_limiter;
mod task;

pub use harvester::{Harvester, ShutdownReport};
pub use paginator::{
    build_http_client, FetchError, ForumApi, Listing, ListingChild, ListingData, Page, Paginator,
    RawSubmission,
};
pub use rate_limiter::RateLimiter;
pub use task::{CrawlTask, CycleReport, TaskExit, TaskOutcome, TaskStats};
