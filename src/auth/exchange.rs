//! Authorization URL and code exchange
//!
//! The exchange is an outbound API call like any page fetch, so it waits for
//! a slot from the shared rate limiter first.

use crate::auth::{AuthError, Credential};
use crate::config::AuthConfig;
use crate::crawler::RateLimiter;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Builds the URL the operator opens to grant access
///
/// Requests a permanent (offline) grant for the configured scope.
pub fn authorization_url(config: &AuthConfig, state: &str) -> Result<Url, AuthError> {
    let mut url = Url::parse(&config.authorize_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("state", state)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("duration", "permanent")
        .append_pair("scope", &config.scope);
    Ok(url)
}

/// Extracts the authorization code from the redirect URL the browser landed on
///
/// The `state` on the redirect must equal the one sent in the authorization
/// URL.
pub fn code_from_redirect(redirect: &str, expected_state: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirect.trim())?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::Rejected(error));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch {
            expected: expected_state.to_string(),
            received: state,
        });
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::Rejected("redirect carried no code".to_string()))
}

/// Raw token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Set instead of a token when the grant was refused
    #[serde(default)]
    pub error: Option<String>,
}

impl TokenResponse {
    /// Converts the response into a credential issued at `issued_at`
    pub fn into_credential(self, issued_at: DateTime<Utc>) -> Result<Credential, AuthError> {
        if let Some(error) = self.error {
            return Err(AuthError::Rejected(error));
        }

        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Rejected("response carried no access_token".to_string()))?;

        let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        Ok(Credential {
            access_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            refresh_token: self.refresh_token,
            scope: self.scope,
            issued_at,
            expires_at: issued_at + Duration::seconds(expires_in),
        })
    }
}

/// Exchanges an authorization code for a credential
///
/// # Arguments
///
/// * `client` - HTTP client carrying the configured user agent
/// * `limiter` - The process-wide rate limiter
/// * `config` - OAuth application settings
/// * `code` - The code delivered to the redirect URI
///
/// # Returns
///
/// * `Ok(Credential)` - A fresh credential; the caller decides where to store it
/// * `Err(AuthError)` - The endpoint was unreachable or refused the code
pub async fn exchange_code(
    client: &Client,
    limiter: &RateLimiter,
    config: &AuthConfig,
    code: &str,
) -> Result<Credential, AuthError> {
    limiter.acquire().await;

    tracing::debug!("Exchanging authorization code at {}", config.token_url);
    let response = client
        .post(&config.token_url)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.trim()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AuthError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = serde_json::from_str(&body)?;
    let credential = token.into_credential(Utc::now())?;

    tracing::info!(
        "Obtained credential valid until {}",
        credential.expires_at.to_rfc3339()
    );

    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            client_id: "my-client".to_string(),
            client_secret: "shh".to_string(),
            authorize_url: "https://www.reddit.com/api/v1/authorize".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            scope: "read".to_string(),
        }
    }

    #[test]
    fn test_authorization_url_parameters() {
        let url = authorization_url(&auth_config(), "xyz").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("www.reddit.com"));
        assert!(pairs.contains(&("client_id".into(), "my-client".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&("duration".into(), "permanent".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:8080/callback".into()
        )));
    }

    #[test]
    fn test_code_from_redirect() {
        let code = code_from_redirect(
            "http://localhost:8080/callback?state=xyz&code=abc123\n",
            "xyz",
        )
        .unwrap();
        assert_eq!(code, "abc123");
    }

    #[test]
    fn test_code_from_redirect_rejects_wrong_state() {
        let result = code_from_redirect("http://localhost:8080/callback?state=evil&code=abc", "xyz");
        assert!(matches!(
            result,
            Err(AuthError::StateMismatch { ref expected, received: Some(ref received) })
                if expected == "xyz" && received == "evil"
        ));

        let result = code_from_redirect("http://localhost:8080/callback?code=abc", "xyz");
        assert!(matches!(
            result,
            Err(AuthError::StateMismatch { received: None, .. })
        ));
    }

    #[test]
    fn test_code_from_redirect_denied_or_empty() {
        let denied =
            code_from_redirect("http://localhost:8080/callback?state=xyz&error=access_denied", "xyz");
        assert!(matches!(denied, Err(AuthError::Rejected(e)) if e == "access_denied"));

        let empty = code_from_redirect("http://localhost:8080/callback?state=xyz&code=", "xyz");
        assert!(matches!(empty, Err(AuthError::Rejected(_))));

        let bare = code_from_redirect("abc123", "xyz");
        assert!(matches!(bare, Err(AuthError::InvalidUrl(_))));
    }

    #[test]
    fn test_token_response_into_credential() {
        let issued = Utc::now();
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"bearer","expires_in":86400,"scope":"read","refresh_token":"r1"}"#,
        )
        .unwrap();

        let credential = response.into_credential(issued).unwrap();
        assert_eq!(credential.access_token, "abc");
        assert_eq!(credential.refresh_token.as_deref(), Some("r1"));
        assert_eq!(credential.expires_at, issued + Duration::seconds(86400));
    }

    #[test]
    fn test_token_response_error_field() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"error":"invalid_grant"}"#).unwrap();
        let result = response.into_credential(Utc::now());
        assert!(matches!(result, Err(AuthError::Rejected(e)) if e == "invalid_grant"));
    }

    #[test]
    fn test_token_response_default_expiry() {
        let issued = Utc::now();
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        let credential = response.into_credential(issued).unwrap();
        assert_eq!(credential.token_type, "bearer");
        assert_eq!(
            credential.expires_at,
            issued + Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
        );
    }
}
