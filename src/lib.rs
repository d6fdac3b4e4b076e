//! Forum-Harvest: a rate-limited submission harvester
//!
//! This crate polls the "new" feed of one or more forums through an
//! authenticated, paginated API, stores every submission exactly once, and
//! keeps per-author totals up to date so that top posters and top posts can
//! be reported without rescanning history.

pub mod auth;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Forum-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Authorization error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid forum name: {0}")]
    InvalidForum(String),
}

/// Result type alias for Forum-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use auth::{Credential, TokenGate};
pub use config::Config;
pub use crawler::{Harvester, RateLimiter};
pub use output::HarvestReport;
pub use state::{CrawlState, Cursor};
pub use storage::{AuthorStatistic, PersistOutcome, SqliteStore, Store, Submission, TopResult};
