use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Forum-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Forums whose "new" feed is harvested, one crawl task each
    pub forums: Vec<String>,
    #[serde(default)]
    pub api: ApiConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Forum API access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the authenticated API
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum submissions requested per page
    #[serde(rename = "page-limit", default = "default_page_limit")]
    pub page_limit: u32,

    /// Period of the process-wide rate limiter (milliseconds)
    #[serde(rename = "request-interval-ms", default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Delay before retrying a failed page fetch (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            page_limit: default_page_limit(),
            request_interval_ms: default_request_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// OAuth application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// OAuth client id
    #[serde(rename = "client-id", default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(rename = "client-secret", default)]
    pub client_secret: String,

    /// Authorization endpoint the operator visits in a browser
    #[serde(rename = "authorize-url", default = "default_authorize_url")]
    pub authorize_url: String,

    /// Token endpoint used for the code exchange
    #[serde(rename = "token-url", default = "default_token_url")]
    pub token_url: String,

    /// Redirect URI registered with the OAuth application
    #[serde(rename = "redirect-uri", default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Requested OAuth scope
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_base_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_user_agent() -> String {
    concat!("forum-harvest/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_page_limit() -> u32 {
    100
}

fn default_request_interval_ms() -> u64 {
    1000
}

fn default_retry_backoff_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_authorize_url() -> String {
    "https://www.reddit.com/api/v1/authorize".to_string()
}

fn default_token_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/callback".to_string()
}

fn default_scope() -> String {
    "read".to_string()
}

fn default_database_path() -> String {
    "./harvest.db".to_string()
}
