//! Shop REST API client.
//!
//! # Architecture
//!
//! - One shared `reqwest::Client` (connection pooling, request timeout)
//! - The server is the source of truth; this module does no caching
//! - Bearer-token auth is passed per call, never stored on the client
//! - Every request carries a fresh `X-Request-Id` for log correlation
//!
//! # Endpoints
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `GET` | `/users/me` | cart, session |
//! | `POST` | `/users/token` | session (login) |
//! | `POST` | `/users/` | session (register) |
//! | `GET` | `/carts/user/{user_id}` | cart |
//! | `POST` | `/carts/` | cart (implicit creation) |
//! | `POST`/`DELETE` | `/carts/user/{user_id}/items/{product_id}` | cart |
//! | `GET` | `/products/{id}`, `/products?category_id=` | catalog |
//! | `GET` | `/categories/`, `/categories/{id}` | catalog |

pub mod types;

pub use types::*;

use std::sync::Arc;

use bazaar_core::{CategoryId, ProductId, UserId};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::StorefrontConfig;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest body excerpt kept for diagnostics.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors that can occur when talking to the shop API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: connection refused, timeout, TLS, etc.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API error {status}: {}", .detail.as_deref().unwrap_or("(no detail)"))]
    Status {
        status: u16,
        /// Server-provided `detail` message, when the body carried one.
        detail: Option<String>,
    },

    /// A success response did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status code, when the server produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Parse(_) | Self::Url(_) => None,
        }
    }

    /// Whether the server rejected the credential.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Whether the requested resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }

    /// Message suitable for showing to a user: the server's `detail` when
    /// present, otherwise the transport error text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Status { status, .. } => format!("Request failed with status {status}"),
            Self::Http(e) => e.to_string(),
            Self::Parse(_) | Self::Url(_) => self.to_string(),
        }
    }
}

/// Extract a human-readable message from an error body.
///
/// FastAPI-style servers return `{"detail": "..."}` for handled errors and
/// `{"detail": [{"msg": "...", ...}]}` for validation failures.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(serde_json::Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the shop REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&SecretString>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.inner.base_url.join(path)?;
        let builder = self.inner.client.request(method, url);
        Ok(match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    /// Send a request and return the body of a success response.
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let response = request
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            // 401 and 404 drive control flow upstream (logout, cart creation)
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
                debug!(%status, path = %url, %request_id, "API returned client status");
            } else {
                warn!(
                    %status,
                    path = %url,
                    %request_id,
                    body = %body.chars().take(BODY_EXCERPT_CHARS).collect::<String>(),
                    "API returned non-success status"
                );
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        debug!(%status, path = %url, %request_id, "API request succeeded");
        Ok(body)
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                body = %body.chars().take(BODY_EXCERPT_CHARS).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Fetch the account the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 401 when the token is rejected.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &SecretString) -> Result<User, ApiError> {
        let request = self.request(Method::GET, "users/me", Some(token))?;
        self.execute_json(request).await
    }

    /// Exchange a username and password for an access token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 401 for wrong credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<TokenResponse, ApiError> {
        let form = [
            ("username", username),
            ("password", password.expose_secret()),
        ];
        let request = self.request(Method::POST, "users/token", None)?.form(&form);
        self.execute_json(request).await
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` when the server rejects the registration.
    #[instrument(skip_all, fields(username = %body.username))]
    pub async fn register(&self, body: &RegisterRequest) -> Result<User, ApiError> {
        let request = self.request(Method::POST, "users/", None)?.json(body);
        self.execute_json(request).await
    }

    // =========================================================================
    // Carts
    // =========================================================================

    /// Fetch a user's cart. A user without a cart yields a 404 status error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the cart does not exist.
    #[instrument(skip(self, token))]
    pub async fn user_cart(&self, token: &SecretString, user_id: UserId) -> Result<CartRecord, ApiError> {
        let request = self.request(Method::GET, &format!("carts/user/{user_id}"), Some(token))?;
        self.execute_json(request).await
    }

    /// Create an empty cart for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn create_cart(&self, token: &SecretString, user_id: UserId) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "carts/", Some(token))?
            .json(&NewCart { user_id });
        self.execute(request).await.map(drop)
    }

    /// Add a product to a user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn add_cart_item(
        &self,
        token: &SecretString,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let path = format!("carts/user/{user_id}/items/{product_id}");
        let request = self.request(Method::POST, &path, Some(token))?;
        self.execute(request).await.map(drop)
    }

    /// Remove a product from a user's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn remove_cart_item(
        &self,
        token: &SecretString,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let path = format!("carts/user/{user_id}/items/{product_id}");
        let request = self.request(Method::DELETE, &path, Some(token))?;
        self.execute(request).await.map(drop)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product does not exist.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        let request = self.request(Method::GET, &format!("products/{id}"), None)?;
        self.execute_json(request).await
    }

    /// Fetch the products of a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn products_in_category(&self, category_id: CategoryId) -> Result<Vec<Product>, ApiError> {
        let request = self
            .request(Method::GET, "products", None)?
            .query(&[("category_id", category_id.as_i64())]);
        self.execute_json(request).await
    }

    /// Fetch all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let request = self.request(Method::GET, "categories/", None)?;
        self.execute_json(request).await
    }

    /// Fetch one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the category does not exist.
    #[instrument(skip(self))]
    pub async fn category(&self, id: CategoryId) -> Result<Category, ApiError> {
        let request = self.request(Method::GET, &format!("categories/{id}"), None)?;
        self.execute_json(request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> ApiClient {
        let config = StorefrontConfig::with_api_url(&format!("{}/api/v1", server.url())).unwrap();
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail": "Cart not found"}"#).as_deref(),
            Some("Cart not found")
        );
    }

    #[test]
    fn test_extract_detail_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "password"], "msg": "too short"}, {"msg": "bad email"}]}"#;
        assert_eq!(extract_detail(body).as_deref(), Some("too short; bad email"));
    }

    #[test]
    fn test_extract_detail_absent() {
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(r#"{"error": "x"}"#), None);
    }

    #[test]
    fn test_user_message_prefers_detail() {
        let err = ApiError::Status {
            status: 400,
            detail: Some("User not found".to_string()),
        };
        assert_eq!(err.user_message(), "User not found");
        assert_eq!(err.to_string(), "API error 400: User not found");

        let err = ApiError::Status {
            status: 502,
            detail: None,
        };
        assert_eq!(err.user_message(), "Request failed with status 502");
    }

    #[tokio::test]
    async fn test_current_user_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/users/me")
            .match_header("authorization", "Bearer tok-123")
            .match_header(REQUEST_ID_HEADER, mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 4, "username": "ivan"}"#)
            .create_async()
            .await;

        let user = client_for(&server)
            .current_user(&SecretString::from("tok-123"))
            .await
            .unwrap();

        assert_eq!(user.id, UserId::new(4));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_errors_carry_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/carts/user/4")
            .with_status(404)
            .with_body(r#"{"detail": "Cart not found"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .user_cart(&SecretString::from("t"), UserId::new(4))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());
        assert_eq!(err.user_message(), "Cart not found");
    }

    #[tokio::test]
    async fn test_login_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/users/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("username".into(), "ivan".into()),
                mockito::Matcher::UrlEncoded("password".into(), "hunter22".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token": "abc", "token_type": "bearer"}"#)
            .create_async()
            .await;

        let token = client_for(&server)
            .login("ivan", &SecretString::from("hunter22"))
            .await
            .unwrap();

        assert_eq!(token.access_token, "abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_products_in_category_query() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/products")
            .match_query(mockito::Matcher::UrlEncoded("category_id".into(), "3".into()))
            .with_status(200)
            .with_body(r#"[{"id": 1, "name": "Tea", "price": 150.5, "category_id": 3}]"#)
            .create_async()
            .await;

        let products = client_for(&server)
            .products_in_category(CategoryId::new(3))
            .await
            .unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products.first().map(|p| p.name.as_str()), Some("Tea"));
    }
}
