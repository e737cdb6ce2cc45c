//! Integration tests for the Bazaar storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! Each test gets its own `mockito` server standing in for the shop API and
//! a temporary data directory, so state written by one `AppState` can be
//! read back by a fresh one the way a restarted client would.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bazaar_storefront::AppState;
use bazaar_storefront::config::StorefrontConfig;
use bazaar_storefront::services::auth::SessionListener;
use bazaar_storefront::storage::FileStore;
use mockito::{Mock, ServerGuard};
use tempfile::TempDir;

/// Counts forced logouts.
#[derive(Debug, Default)]
pub struct CountingListener(AtomicUsize);

impl CountingListener {
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl SessionListener for CountingListener {
    fn session_expired(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A mock API server plus a data directory that outlives client restarts.
pub struct TestContext {
    pub server: ServerGuard,
    pub data_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            server: mockito::Server::new_async().await,
            data_dir: tempfile::tempdir().unwrap(),
        }
    }

    #[must_use]
    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    /// Build a client over the shared data directory.
    #[must_use]
    pub fn client(&self) -> (AppState, Arc<CountingListener>) {
        let config = StorefrontConfig {
            data_dir: self.data_path().to_path_buf(),
            ..StorefrontConfig::with_api_url(&self.server.url()).unwrap()
        };
        let storage = Arc::new(FileStore::new(config.data_dir.clone()));
        let listener = Arc::new(CountingListener::default());
        let state = AppState::new(config, storage, listener.clone()).unwrap();
        (state, listener)
    }

    /// Token endpoint issuing `token`.
    pub async fn mock_login(&mut self, token: &str) -> Mock {
        self.server
            .mock("POST", "/users/token")
            .with_status(200)
            .with_body(format!(r#"{{"access_token": "{token}", "token_type": "bearer"}}"#))
            .create_async()
            .await
    }

    /// `GET /users/me` answering for `token`.
    pub async fn mock_me(&mut self, token: &str, user_id: i64) -> Mock {
        self.server
            .mock("GET", "/users/me")
            .match_header("authorization", format!("Bearer {token}").as_str())
            .with_status(200)
            .with_body(format!(
                r#"{{"id": {user_id}, "username": "ivan", "email": "ivan@example.com"}}"#
            ))
            .create_async()
            .await
    }

    /// `GET /carts/user/{user_id}` returning `items`.
    pub async fn mock_cart(&mut self, user_id: i64, items: &[i64]) -> Mock {
        self.server
            .mock("GET", format!("/carts/user/{user_id}").as_str())
            .with_status(200)
            .with_body(serde_json::json!({ "user_id": user_id, "items": items }).to_string())
            .expect(1)
            .create_async()
            .await
    }
}
