//! Authorization module
//!
//! This module covers everything the crawler needs from OAuth:
//! - `Credential`: the bearer token blob with its issuance and expiry times
//! - `TokenGate`: holds the current credential and answers "is it usable?"
//! - Building the authorization URL and exchanging the returned code
//!
//! The browser redirect that delivers the code is left to the operator; the
//! CLI prints the URL and reads the redirect URL back from stdin.

mod credential;
mod exchange;

pub use credential::{is_usable, Credential, TokenGate};
pub use exchange::{authorization_url, code_from_redirect, exchange_code, TokenResponse};

use thiserror::Error;

/// Errors that can occur while obtaining or using a credential
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP error during token exchange: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Token endpoint rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Redirect state {received:?} does not match the state sent ({expected})")]
    StateMismatch {
        expected: String,
        received: Option<String>,
    },

    #[error("No credential has been stored yet")]
    MissingCredential,

    #[error("Credential expired at {expires_at}")]
    Expired {
        expires_at: chrono::DateTime<chrono::Utc>,
    },
}
