use crate::config::types::{ApiConfig, AuthConfig, Config, StorageConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_forums(&config.forums)?;
    validate_api_config(&config.api)?;
    validate_auth_config(&config.auth)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates the forum list
fn validate_forums(forums: &[String]) -> Result<(), ConfigError> {
    if forums.is_empty() {
        return Err(ConfigError::Validation(
            "at least one forum must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for forum in forums {
        validate_forum_name(forum)?;
        if !seen.insert(forum.to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "forum '{}' is listed more than once",
                forum
            )));
        }
    }

    Ok(())
}

/// Validates a single forum name: 2-21 characters of `[A-Za-z0-9_]`
pub(crate) fn validate_forum_name(name: &str) -> Result<(), ConfigError> {
    if name.len() < 2 || name.len() > 21 {
        return Err(ConfigError::InvalidForum(format!(
            "'{}' must be between 2 and 21 characters",
            name
        )));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::InvalidForum(format!(
            "'{}' may only contain letters, digits and underscores",
            name
        )));
    }

    Ok(())
}

/// Validates API access configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_https_url("base-url", &config.base_url)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.page_limit < 1 || config.page_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "page-limit must be between 1 and 100, got {}",
            config.page_limit
        )));
    }

    // one request per second is the upstream ceiling
    if config.request_interval_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "request-interval-ms must be >= 1000ms, got {}ms",
            config.request_interval_ms
        )));
    }

    if config.retry_backoff_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "retry-backoff-ms must be >= 100ms, got {}ms",
            config.retry_backoff_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates OAuth configuration
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    if config.client_id.is_empty() {
        return Err(ConfigError::Validation(
            "client-id cannot be empty (set it in the file or via REDDIT_CLIENT_ID)".to_string(),
        ));
    }

    if config.client_secret.is_empty() {
        return Err(ConfigError::Validation(
            "client-secret cannot be empty (set it in the file or via REDDIT_SECRET)".to_string(),
        ));
    }

    Url::parse(&config.authorize_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid authorize-url: {}", e)))?;
    Url::parse(&config.redirect_uri)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redirect-uri: {}", e)))?;
    validate_https_url("token-url", &config.token_url)?;

    if config.scope.trim().is_empty() {
        return Err(ConfigError::Validation("scope cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_https_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTPS scheme",
            key, value
        )));
    }

    Ok(())
}
