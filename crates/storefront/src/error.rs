//! Unified error handling.
//!
//! Provides a unified `AppError` type for front-ends that drive several
//! services. Each variant keeps its source error; `user_message` gives the
//! text that is safe to show to a shopper.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::services::auth::AuthError;
use crate::services::catalog::CatalogError;
use crate::storage::StorageError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// API transport or status failure.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A cart round-trip failed; holds the message the cart recorded.
    #[error("Cart error: {0}")]
    CartFailed(String),

    /// The operation needs a signed-in user.
    #[error("Not logged in")]
    NotLoggedIn,
}

impl AppError {
    /// Message suitable for display to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.to_string(),
            Self::Storage(_) => "Could not save local data".to_string(),
            Self::Api(err) => err.user_message(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid username or password".to_string(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Validation { .. } => err.to_string(),
                AuthError::Api(api) => api.user_message(),
                AuthError::Storage(_) => "Could not save the session".to_string(),
            },
            Self::Catalog(CatalogError::NotFound(what)) => format!("Not found: {what}"),
            Self::Catalog(CatalogError::Api(api)) => api.user_message(),
            Self::CartFailed(message) => message.clone(),
            Self::NotLoggedIn => "Please log in first".to_string(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
