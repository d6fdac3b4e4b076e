//! Configuration module for Forum-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use forum_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} forums", config.forums.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, AuthConfig, Config, StorageConfig};

pub(crate) use validation::validate_forum_name;

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    CLIENT_ID_ENV, CLIENT_SECRET_ENV,
};
