//! Authentication service.
//!
//! Password login against `POST /users/token`, account registration, and
//! the persisted session credential that the cart store reads its token from.

mod error;
mod session;

pub use error::AuthError;
pub use session::{
    CREDENTIAL_KEY, LogSessionListener, SessionListener, SessionStore, StoredCredential,
};

use bazaar_core::Email;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use crate::api::{ApiClient, RegisterRequest, User};

/// Minimum password length accepted by the server.
const MIN_PASSWORD_LENGTH: usize = 8;
/// Username length bounds accepted by the server.
const USERNAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=50;
/// First/last name length bounds accepted by the server.
const NAME_LENGTH: std::ops::RangeInclusive<usize> = 1..=50;

/// Input for account registration.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: SecretString,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewAccount {
    /// Check the account against the server's field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` or `AuthError::InvalidEmail` for the
    /// first field that fails.
    pub fn validate(&self) -> Result<Email, AuthError> {
        check_length("username", self.username.trim(), &USERNAME_LENGTH)?;
        if self.password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation {
                field: "password",
                reason: format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
            });
        }
        let email = Email::parse(&self.email)?;
        check_length("first_name", self.first_name.trim(), &NAME_LENGTH)?;
        check_length("last_name", self.last_name.trim(), &NAME_LENGTH)?;
        Ok(email)
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    bounds: &std::ops::RangeInclusive<usize>,
) -> Result<(), AuthError> {
    let len = value.chars().count();
    if bounds.contains(&len) {
        Ok(())
    } else {
        Err(AuthError::Validation {
            field,
            reason: format!(
                "must be between {} and {} characters (got {len})",
                bounds.start(),
                bounds.end()
            ),
        })
    }
}

/// Authentication service.
///
/// Handles login, registration and logout, keeping the [`SessionStore`]
/// in step with the server.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    session: SessionStore,
}

impl AuthService {
    #[must_use]
    pub const fn new(api: ApiClient, session: SessionStore) -> Self {
        Self { api, session }
    }

    /// The session store this service writes to.
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Log in and persist the issued token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a 401 from the token
    /// endpoint, or the underlying API/storage error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<User, AuthError> {
        let token = self
            .api
            .login(username, password)
            .await
            .map_err(|e| {
                if e.is_unauthorized() {
                    AuthError::InvalidCredentials
                } else {
                    AuthError::Api(e)
                }
            })?;

        let credential = StoredCredential::new(token.access_token, token.token_type);
        let user = self.api.current_user(&credential.access_token).await?;
        self.session.save(&credential)?;

        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Register a new account, then log in with it.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any request is made, or the
    /// server's rejection.
    #[instrument(skip_all, fields(username = %account.username))]
    pub async fn register(&self, account: &NewAccount) -> Result<User, AuthError> {
        let email = account.validate()?;
        let username = account.username.trim().to_string();

        let request = RegisterRequest {
            username: username.clone(),
            password: account.password.expose_secret().to_string(),
            email: email.into(),
            first_name: account.first_name.trim().to_string(),
            last_name: account.last_name.trim().to_string(),
            is_active: true,
        };
        let created = self.api.register(&request).await?;
        info!(user_id = %created.id, "Account registered");

        self.login(&username, &account.password).await
    }

    /// Forget the stored credential.
    pub fn logout(&self) {
        self.session.clear();
        info!("Logged out");
    }

    /// The account behind the stored credential.
    ///
    /// Returns `Ok(None)` when there is no credential, or when the server
    /// rejects it (the stale credential is cleared).
    ///
    /// # Errors
    ///
    /// Returns any non-401 API failure.
    #[instrument(skip(self))]
    pub async fn whoami(&self) -> Result<Option<User>, AuthError> {
        let Some(token) = self.session.token() else {
            return Ok(None);
        };
        match self.api.current_user(&token).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_unauthorized() => {
                self.session.clear();
                Ok(None)
            }
            Err(e) => Err(AuthError::Api(e)),
        }
    }
}
