//! Forum-Harvest main entry point
//!
//! This is the command-line interface for the forum submission harvester.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use forum_harvest::auth::{authorization_url, code_from_redirect, exchange_code, TokenGate};
use forum_harvest::config::{load_config_with_hash, Config};
use forum_harvest::crawler::{build_http_client, Harvester, RateLimiter};
use forum_harvest::output::{load_report, print_report, reset_aggregates};
use forum_harvest::storage::{self, SqliteStore, Store};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Forum-Harvest: a rate-limited forum submission harvester
///
/// Polls the newest submissions of each configured forum, stores every
/// submission once, and keeps per-author totals for top poster and top post
/// reporting.
#[derive(Parser, Debug)]
#[command(name = "forum-harvest")]
#[command(version)]
#[command(about = "A rate-limited forum submission harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Authorize against the forum API and store the credential
    #[arg(long, conflicts_with_all = ["stats", "reset", "dry_run"])]
    login: bool,

    /// Show the aggregate report from the database and exit
    #[arg(long, conflicts_with_all = ["login", "reset", "dry_run"])]
    stats: bool,

    /// Clear all submissions and author statistics and exit
    #[arg(long, conflicts_with_all = ["login", "stats", "dry_run"])]
    reset: bool,

    /// Validate config and show what would be harvested without crawling
    #[arg(long, conflicts_with_all = ["login", "stats", "reset"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = open_store(Path::new(&config.storage.database_path))?;

    if cli.login {
        handle_login(&config, store.as_ref()).await
    } else if cli.stats {
        handle_stats(&config, store.as_ref())
    } else if cli.reset {
        handle_reset(store.as_ref())
    } else if cli.dry_run {
        handle_dry_run(&config, store.as_ref())
    } else {
        handle_crawl(&config, store).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_harvest=info,warn"),
            1 => EnvFilter::new("forum_harvest=debug,info"),
            2 => EnvFilter::new("forum_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_store(path: &Path) -> anyhow::Result<Arc<SqliteStore>> {
    let store = storage::open_store(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Completes on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Handles --login: prints the authorization URL, checks the pasted redirect
/// and exchanges its code
async fn handle_login(config: &Config, store: &dyn Store) -> anyhow::Result<()> {
    let state = login_state();
    let url = authorization_url(&config.auth, &state)?;

    println!("=== Forum-Harvest Authorization ===\n");
    println!("Open this URL in a browser and grant access:\n");
    println!("  {}\n", url);
    println!("Then paste the full URL you were redirected to here:");

    let mut redirect = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut redirect)
        .await
        .context("failed to read redirect URL")?;
    if redirect.trim().is_empty() {
        bail!("no redirect URL entered");
    }
    let code = code_from_redirect(&redirect, &state)?;

    let client = build_http_client(&config.api)?;
    let limiter = RateLimiter::new(config.api.request_interval());
    let credential = exchange_code(&client, &limiter, &config.auth, &code).await?;
    let expires_at = credential.expires_at;

    TokenGate::empty().store(store, credential)?;

    println!("✓ Credential stored, valid until {}", expires_at.to_rfc3339());
    Ok(())
}

/// Opaque value the redirect must echo back
fn login_state() -> String {
    let seed = format!(
        "{}:{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );
    hex::encode(&Sha256::digest(seed.as_bytes())[..8])
}

/// Handles --stats: prints the aggregate report without crawling
fn handle_stats(config: &Config, store: &dyn Store) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let report = load_report(store)?;
    print_report(&report);

    Ok(())
}

/// Handles --reset: clears submissions and author totals together
fn handle_reset(store: &dyn Store) -> anyhow::Result<()> {
    reset_aggregates(store)?;
    println!("✓ All submissions and author statistics cleared");
    Ok(())
}

/// Handles --dry-run: shows the effective configuration and credential status
fn handle_dry_run(config: &Config, store: &dyn Store) -> anyhow::Result<()> {
    println!("=== Forum-Harvest Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  User agent: {}", config.api.user_agent);
    println!("  Page limit: {}", config.api.page_limit);
    println!("  Request interval: {}ms", config.api.request_interval_ms);
    println!("  Retry backoff: {}ms", config.api.retry_backoff_ms);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nForums ({}):", config.forums.len());
    for forum in &config.forums {
        println!("  - r/{}", forum);
    }

    let gate = TokenGate::load(store)?;
    println!("\nCredential:");
    match gate.current() {
        Some(credential) if gate.is_usable() => {
            println!("  valid until {}", credential.expires_at.to_rfc3339())
        }
        Some(credential) => println!("  expired at {}", credential.expires_at.to_rfc3339()),
        None => println!("  none stored"),
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main harvest: crawl until a signal or a credential failure
async fn handle_crawl(config: &Config, store: Arc<SqliteStore>) -> anyhow::Result<()> {
    let gate = Arc::new(TokenGate::load(store.as_ref())?);
    if gate.needs_reauthorization() {
        bail!("no usable credential stored; run again with --login to authorize");
    }

    let limiter = Arc::new(RateLimiter::new(config.api.request_interval()));
    let mut harvester = Harvester::from_config(config, store, gate, limiter)?;
    harvester.start_crawling(&config.forums)?;

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
        _ = harvester.credential_failure() => {
            tracing::error!("Credential rejected by the forum API, stopping");
        }
    }

    let shutdown = harvester.shutdown().await?;
    print_report(&shutdown.report);

    let failed = shutdown.credential_failures();
    if !failed.is_empty() {
        bail!(
            "credential rejected while crawling {}; run with --login to re-authorize",
            failed
                .iter()
                .map(|f| format!("r/{}", f))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    tracing::info!("Harvest stopped cleanly");
    Ok(())
}
