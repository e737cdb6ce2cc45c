//! Persisted session credential.
//!
//! The credential lives under the `user` storage key as
//! `{"access_token": "...", "token_type": "bearer"}`, the same document the
//! web client writes, so both clients can share a data directory.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::types::default_token_type;
use crate::storage::{KeyValueStore, StorageError};

/// Storage key of the credential document.
pub const CREDENTIAL_KEY: &str = "user";

/// Key written by older clients that stored the bare token.
const LEGACY_TOKEN_KEY: &str = "authToken";

/// An access token obtained at login.
#[derive(Clone)]
pub struct StoredCredential {
    pub access_token: SecretString,
    pub token_type: String,
    /// When the credential was saved. Absent for documents written by other clients.
    pub saved_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

impl StoredCredential {
    /// Credential for a freshly issued token.
    #[must_use]
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            token_type: token_type.into(),
            saved_at: Some(Utc::now()),
        }
    }
}

/// On-disk shape of [`StoredCredential`].
#[derive(Serialize, Deserialize)]
struct CredentialDocument {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

/// Observer for forced logouts.
///
/// Stands in for the web client's redirect to the login page: the cart store
/// calls [`SessionListener::session_expired`] once per operation that hit a
/// 401, after the credential has been cleared.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

/// Listener that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSessionListener;

impl SessionListener for LogSessionListener {
    fn session_expired(&self) {
        warn!("Session expired, login required");
    }
}

/// Reads and writes the session credential.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// The saved credential, if any.
    ///
    /// Unreadable storage, malformed JSON and empty tokens all count as
    /// "not logged in".
    #[must_use]
    pub fn current(&self) -> Option<StoredCredential> {
        let raw = match self.storage.get(CREDENTIAL_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read session credential");
                return None;
            }
        };

        let document: CredentialDocument = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed session credential");
                return None;
            }
        };

        if document.access_token.trim().is_empty() {
            return None;
        }

        Some(StoredCredential {
            access_token: SecretString::from(document.access_token),
            token_type: document.token_type,
            saved_at: document.saved_at,
        })
    }

    /// Shorthand for the current access token.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.current().map(|credential| credential.access_token)
    }

    /// Persist a credential, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential cannot be encoded or written.
    pub fn save(&self, credential: &StoredCredential) -> Result<(), StorageError> {
        let document = CredentialDocument {
            access_token: credential.access_token.expose_secret().to_string(),
            token_type: credential.token_type.clone(),
            saved_at: credential.saved_at,
        };
        let json = serde_json::to_string(&document).map_err(|source| StorageError::Encode {
            key: CREDENTIAL_KEY.to_string(),
            source,
        })?;
        self.storage.set(CREDENTIAL_KEY, &json)?;
        debug!("Session credential saved");
        Ok(())
    }

    /// Forget the credential. Storage failures are logged, not returned.
    pub fn clear(&self) {
        for key in [CREDENTIAL_KEY, LEGACY_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to clear session key");
            }
        }
        debug!("Session credential cleared");
    }
}
