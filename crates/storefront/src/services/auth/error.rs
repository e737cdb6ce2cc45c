//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Errors that can occur during login, registration and session handling.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] bazaar_core::EmailError),

    /// Wrong username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration input rejected before reaching the server.
    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The server rejected or failed the request.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The credential could not be persisted.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
