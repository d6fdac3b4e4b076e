use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that overrides `auth.client-id`
pub const CLIENT_ID_ENV: &str = "REDDIT_CLIENT_ID";

/// Environment variable that overrides `auth.client-secret`
pub const CLIENT_SECRET_ENV: &str = "REDDIT_SECRET";

/// Loads and parses a configuration file from the given path
///
/// OAuth client credentials found in the environment take precedence over
/// the values in the file.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use forum_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Database: {}", config.storage.database_path);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate(&config)?;

    Ok(config)
}

/// Replaces the OAuth client id and secret with values from `lookup`
///
/// Empty values returned by `lookup` are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(id) = lookup(CLIENT_ID_ENV).filter(|v| !v.is_empty()) {
        config.auth.client_id = id;
    }
    if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|v| !v.is_empty()) {
        config.auth.client_secret = secret;
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so an operator can tell which configuration a run used.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
