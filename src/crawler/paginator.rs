//! Paginated access to a forum's "new" feed
//!
//! This module handles:
//! - Building the HTTP client used for all API calls
//! - One bounded page request per call, authenticated with the current credential
//! - Decoding the listing payload into submissions
//! - Computing the cursor for the next call
//!
//! Errors are classified so the crawl task can tell transient failures
//! (transport, unexpected status) from malformed payloads and from
//! credential problems that need an operator.

use crate::auth::TokenGate;
use crate::config::ApiConfig;
use crate::state::Cursor;
use crate::storage::Submission;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors produced by a page fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("Malformed page payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Malformed submission: {0}")]
    Malformed(String),

    #[error("Credential rejected by the API (HTTP {status})")]
    CredentialRejected { status: u16 },

    #[error("No usable credential: {0}")]
    CredentialUnavailable(#[from] crate::auth::AuthError),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// True for failures that retrying with the same credential cannot fix
    pub fn is_credential(&self) -> bool {
        matches!(
            self,
            Self::CredentialRejected { .. } | Self::CredentialUnavailable(_)
        )
    }

    /// True when the response arrived but could not be decoded
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Malformed(_))
    }
}

/// One page of a forum feed
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Submissions in feed order; may be empty
    pub submissions: Vec<Submission>,
    /// Cursor to pass to the next fetch
    pub next_cursor: Cursor,
}

/// Source of feed pages
///
/// An empty page is a valid answer. Fetching again with the cursor returned
/// for an empty page must not resurface anything already returned.
pub trait Paginator: Send + Sync {
    fn fetch(
        &self,
        forum: &str,
        cursor: &Cursor,
    ) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

// ===== Wire format =====

/// Top-level listing envelope
#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
pub struct ListingChild {
    pub data: RawSubmission,
}

/// A submission as the API returns it
#[derive(Debug, Deserialize)]
pub struct RawSubmission {
    pub id: String,
    /// Fullname such as `t3_abc123`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "selftext")]
    pub body: String,
    pub author: String,
    #[serde(default, rename = "ups", alias = "upvotes")]
    pub upvotes: i64,
    #[serde(default)]
    pub num_comments: i64,
    pub created_utc: f64,
}

impl RawSubmission {
    pub fn fullname(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("t3_{}", self.id))
    }

    fn into_submission(self, forum: &str) -> Result<Submission, FetchError> {
        let created_at = DateTime::<Utc>::from_timestamp(self.created_utc.trunc() as i64, 0)
            .ok_or_else(|| {
                FetchError::Malformed(format!(
                    "submission {} has out-of-range created_utc {}",
                    self.id, self.created_utc
                ))
            })?;

        Ok(Submission {
            external_id: self.id,
            forum: forum.to_string(),
            author: self.author,
            title: self.title,
            body: self.body,
            upvote_count: self.upvotes,
            comment_count: self.num_comments,
            created_at,
        })
    }
}

impl Listing {
    /// Converts a decoded listing into a page
    ///
    /// The next cursor points at the newest submission on the page, even when
    /// that submission is itself skipped. An empty page hands back the cursor
    /// it was fetched with. Children that cannot be converted are logged and
    /// dropped.
    pub fn into_page(self, forum: &str, cursor: &Cursor) -> Page {
        let next_cursor = match self.data.children.first() {
            Some(newest) => Cursor::at(newest.data.fullname()),
            None => cursor.clone(),
        };

        let mut submissions = Vec::with_capacity(self.data.children.len());
        for child in self.data.children {
            let id = child.data.id.clone();
            match child.data.into_submission(forum) {
                Ok(submission) => submissions.push(submission),
                Err(e) => {
                    tracing::warn!(forum, id = %id, "Skipping malformed submission: {}", e);
                }
            }
        }

        Page {
            submissions,
            next_cursor,
        }
    }
}

// ===== HTTP implementation =====

/// Builds the HTTP client used for every API call
///
/// # Arguments
///
/// * `config` - API settings providing the user agent and timeout
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(std::time::Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Paginator backed by the forum's authenticated HTTP API
pub struct ForumApi {
    client: Client,
    base_url: Url,
    page_limit: u32,
    gate: Arc<TokenGate>,
}

impl ForumApi {
    /// Creates an API paginator
    ///
    /// # Returns
    ///
    /// * `Ok(ForumApi)` - Ready to fetch
    /// * `Err(FetchError::InvalidUrl)` - `base_url` cannot carry a path
    pub fn new(
        client: Client,
        base_url: &str,
        page_limit: u32,
        gate: Arc<TokenGate>,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            client,
            base_url,
            page_limit,
            gate,
        })
    }

    /// Builds `GET {base}/r/{forum}/new?limit=N[&before=cursor]`
    pub fn page_url(&self, forum: &str, cursor: &Cursor) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["r", forum, "new"]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_limit.to_string());
            query.append_pair("raw_json", "1");
            if let Some(before) = cursor.before() {
                query.append_pair("before", before);
            }
        }

        Ok(url)
    }
}

impl Paginator for ForumApi {
    async fn fetch(&self, forum: &str, cursor: &Cursor) -> Result<Page, FetchError> {
        let token = self.gate.bearer()?;
        let url = self.page_url(forum, cursor)?;

        tracing::trace!("GET {}", url);
        let response = self.client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::CredentialRejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let listing: Listing = serde_json::from_str(&body)?;

        tracing::trace!(
            forum,
            before = ?listing.data.before,
            after = ?listing.data.after,
            children = listing.data.children.len(),
            "Decoded listing"
        );

        Ok(listing.into_page(forum, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use chrono::Duration;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "before": null,
            "after": "t3_older",
            "children": [
                {"kind": "t3", "data": {"id": "b2", "name": "t3_b2", "title": "Newest", "selftext": "",
                  "author": "alice", "ups": 12, "num_comments": 3, "created_utc": 1700000100.0}},
                {"kind": "t3", "data": {"id": "a1", "name": "t3_a1", "title": "Older", "selftext": "hi",
                  "author": "bob", "ups": 4, "num_comments": 0, "created_utc": 1700000000.0}}
            ]
        }
    }"#;

    fn api(base: &str) -> ForumApi {
        let now = Utc::now();
        let gate = Arc::new(TokenGate::with_credential(Credential::new(
            "tok",
            now,
            now + Duration::hours(1),
        )));
        ForumApi::new(Client::new(), base, 100, gate).unwrap()
    }

    #[test]
    fn test_listing_into_page() {
        let listing: Listing = serde_json::from_str(LISTING).unwrap();
        let page = listing.into_page("news", &Cursor::start());

        assert_eq!(page.submissions.len(), 2);
        assert_eq!(page.next_cursor, Cursor::at("t3_b2"));

        let newest = &page.submissions[0];
        assert_eq!(newest.external_id, "b2");
        assert_eq!(newest.forum, "news");
        assert_eq!(newest.author, "alice");
        assert_eq!(newest.upvote_count, 12);
        assert_eq!(newest.comment_count, 3);
        assert_eq!(newest.created_at.timestamp(), 1700000100);
        assert_eq!(page.submissions[1].body, "hi");
    }

    #[test]
    fn test_empty_listing_keeps_cursor() {
        let listing: Listing =
            serde_json::from_str(r#"{"data": {"before": null, "after": null, "children": []}}"#)
                .unwrap();
        let cursor = Cursor::at("t3_b2");
        let page = listing.into_page("news", &cursor);

        assert!(page.submissions.is_empty());
        assert_eq!(page.next_cursor, cursor);
    }

    #[test]
    fn test_malformed_child_is_skipped() {
        let listing: Listing = serde_json::from_str(
            r#"{"data": {"children": [
                {"data": {"id": "good2", "name": "t3_good2", "author": "alice", "ups": 3, "created_utc": 1700000200.0}},
                {"data": {"id": "bad", "name": "t3_bad", "author": "bob", "ups": 9, "created_utc": 1e20}},
                {"data": {"id": "good1", "name": "t3_good1", "author": "carol", "ups": 1, "created_utc": 1700000100.0}}
            ]}}"#,
        )
        .unwrap();
        let page = listing.into_page("news", &Cursor::start());

        let ids: Vec<_> = page.submissions.iter().map(|s| s.external_id.as_str()).collect();
        assert_eq!(ids, vec!["good2", "good1"]);
        assert_eq!(page.next_cursor, Cursor::at("t3_good2"));
    }

    #[test]
    fn test_malformed_newest_child_still_advances_cursor() {
        let listing: Listing = serde_json::from_str(
            r#"{"data": {"children": [
                {"data": {"id": "bad", "name": "t3_bad", "author": "bob", "created_utc": -1e20}},
                {"data": {"id": "ok", "name": "t3_ok", "author": "alice", "created_utc": 1700000000.0}}
            ]}}"#,
        )
        .unwrap();
        let page = listing.into_page("news", &Cursor::at("t3_old"));

        assert_eq!(page.submissions.len(), 1);
        assert_eq!(page.submissions[0].external_id, "ok");
        assert_eq!(page.next_cursor, Cursor::at("t3_bad"));
    }

    #[test]
    fn test_fullname_falls_back_to_id() {
        let raw: RawSubmission = serde_json::from_str(
            r#"{"id": "zz9", "author": "x", "upvotes": 5, "created_utc": 1.0}"#,
        )
        .unwrap();
        assert_eq!(raw.fullname(), "t3_zz9");
        assert_eq!(raw.upvotes, 5);
    }

    #[test]
    fn test_missing_author_is_decode_error() {
        let err = serde_json::from_str::<Listing>(
            r#"{"data": {"children": [{"data": {"id": "1", "created_utc": 1.0}}]}}"#,
        )
        .map_err(FetchError::from)
        .unwrap_err();
        assert!(err.is_decode());
        assert!(!err.is_credential());
    }

    #[test]
    fn test_page_url() {
        let api = api("https://oauth.reddit.com");

        let first = api.page_url("news", &Cursor::start()).unwrap();
        assert_eq!(
            first.as_str(),
            "https://oauth.reddit.com/r/news/new?limit=100&raw_json=1"
        );

        let next = api.page_url("news", &Cursor::at("t3_b2")).unwrap();
        assert_eq!(
            next.as_str(),
            "https://oauth.reddit.com/r/news/new?limit=100&raw_json=1&before=t3_b2"
        );
    }

    #[test]
    fn test_page_url_with_base_path() {
        let api = api("https://proxy.example.com/forum-api/");
        let url = api.page_url("rust", &Cursor::start()).unwrap();
        assert_eq!(url.path(), "/forum-api/r/rust/new");
    }

    #[test]
    fn test_error_classification() {
        assert!(FetchError::CredentialRejected { status: 401 }.is_credential());
        assert!(FetchError::CredentialUnavailable(crate::auth::AuthError::MissingCredential)
            .is_credential());
        assert!(!FetchError::Status { status: 503 }.is_credential());
        assert!(FetchError::Malformed("x".to_string()).is_decode());
    }

    #[tokio::test]
    async fn test_fetch_without_credential_fails_before_request() {
        let api = ForumApi::new(
            Client::new(),
            "https://oauth.reddit.com",
            100,
            Arc::new(TokenGate::empty()),
        )
        .unwrap();
        let result = api.fetch("news", &Cursor::start()).await;
        assert!(matches!(result, Err(FetchError::CredentialUnavailable(_))));
    }
}
