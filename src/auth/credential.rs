//! Credential and token gate
//!
//! Only one credential is authoritative at a time. Storing a new one replaces
//! the old one; nothing is merged.

use crate::auth::AuthError;
use crate::storage::{StorageResult, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;

/// A bearer credential for the forum API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Creates a bearer credential with no refresh token or scope
    pub fn new(
        access_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "bearer".to_string(),
            refresh_token: None,
            scope: None,
            issued_at,
            expires_at,
        }
    }

    /// Returns true if the expiry is at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// Keeps the token itself out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Returns true iff a credential is present and expires strictly after `now`
pub fn is_usable(credential: Option<&Credential>, now: DateTime<Utc>) -> bool {
    credential.is_some_and(|c| !c.is_expired_at(now))
}

/// Holds the current credential for the whole process
///
/// `load` and `store` are the only ways the credential changes. The gate does
/// not refresh anything: an expired credential is reported to the caller,
/// which must run the authorization flow again.
#[derive(Debug, Default)]
pub struct TokenGate {
    current: RwLock<Option<Credential>>,
}

impl TokenGate {
    /// Creates a gate with no credential (the documented initial state)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(credential)),
        }
    }

    /// Reads the latest stored credential; an empty store yields an empty gate
    pub fn load(store: &dyn Store) -> StorageResult<Self> {
        let credential = store.load_credential()?;
        Ok(Self {
            current: RwLock::new(credential),
        })
    }

    /// Persists `credential` and makes it the current one
    pub fn store(&self, store: &dyn Store, credential: Credential) -> StorageResult<()> {
        store.save_credential(&credential)?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(credential);
        Ok(())
    }

    pub fn current(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        is_usable(self.current().as_ref(), now)
    }

    /// True when crawling cannot proceed without a new authorization
    pub fn needs_reauthorization(&self) -> bool {
        !self.is_usable()
    }

    /// Returns the access token if the credential is usable right now
    pub fn bearer(&self) -> Result<String, AuthError> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            None => Err(AuthError::MissingCredential),
            Some(c) if c.is_expired_at(Utc::now()) => Err(AuthError::Expired {
                expires_at: c.expires_at,
            }),
            Some(c) => Ok(c.access_token.clone()),
        }
    }
}
