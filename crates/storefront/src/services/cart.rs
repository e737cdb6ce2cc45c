//! Cart store.
//!
//! Mirrors one authenticated user's server-side cart. The server record is
//! the only source of truth: every add or remove is sent to the API and then
//! followed by a full re-fetch, and only that re-fetch updates local state.
//!
//! # States
//!
//! ```text
//!            load/add/remove
//! Unauthenticated ──────────▶ Loading ──ok──▶ Synced
//!        ▲                      │
//!        └────────401───────────┤
//!                               └──other──▶ Error { message }
//! ```
//!
//! Mutations are serialized per store: a call made while another is in
//! flight waits its turn (FIFO) and then performs its own round-trip, so the
//! state left behind is always the re-fetch of the last call issued.
//!
//! A call dropped mid-flight loses its update and returns the store to the
//! status it had before the call.

use std::sync::{Arc, PoisonError, RwLock};

use bazaar_core::ProductId;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, ApiError, User};
use crate::services::auth::{SessionListener, SessionStore};

/// Errors raised inside a cart operation before they are folded into
/// [`CartStatus`].
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_unauthorized())
    }

    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
        }
    }
}

/// Where the local cart stands relative to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartStatus {
    /// No session; the cart is empty and mutations fail without a request.
    Unauthenticated,
    /// A round-trip is in flight.
    Loading,
    /// `items` is the result of the last successful server read.
    Synced,
    /// The last operation failed. `items` still holds the last good read.
    Error { message: String },
}

#[derive(Debug)]
struct CartState {
    items: Vec<ProductId>,
    status: CartStatus,
}

/// Cache of the user's server-side cart.
pub struct CartStore {
    api: ApiClient,
    session: SessionStore,
    listener: Arc<dyn SessionListener>,
    state: RwLock<CartState>,
    /// Held for the whole of a round-trip; FIFO, so calls run in issue order.
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CartStore")
            .field("items", &state.items)
            .field("status", &state.status)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty, unauthenticated store. Call [`CartStore::load`] to
    /// fetch the server cart.
    #[must_use]
    pub fn new(api: ApiClient, session: SessionStore, listener: Arc<dyn SessionListener>) -> Self {
        Self {
            api,
            session,
            listener,
            state: RwLock::new(CartState {
                items: Vec::new(),
                status: CartStatus::Unauthenticated,
            }),
            in_flight: Mutex::new(()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Product ids in server order.
    #[must_use]
    pub fn items(&self) -> Vec<ProductId> {
        self.read_state(|state| state.items.clone())
    }

    #[must_use]
    pub fn is_in_cart(&self, product_id: ProductId) -> bool {
        self.read_state(|state| state.items.contains(&product_id))
    }

    #[must_use]
    pub fn status(&self) -> CartStatus {
        self.read_state(|state| state.status.clone())
    }

    /// Message of the last failure, while the store is in the error state.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read_state(|state| match &state.status {
            CartStatus::Error { message } => Some(message.clone()),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read_state(|state| state.status == CartStatus::Loading)
    }

    fn read_state<T>(&self, f: impl FnOnce(&CartState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write_state(&self, f: impl FnOnce(&mut CartState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner));
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Adopt the server cart for the stored session.
    ///
    /// A user without a server cart is synced to an empty cart.
    /// Returns whether the cart is now synced.
    #[instrument(skip(self))]
    pub async fn load(&self) -> bool {
        let _turn = self.in_flight.lock().await;
        let Some((token, pending)) = self.begin("load") else {
            return false;
        };
        let outcome = self.fetch_round_trip(&token).await;
        pending.settle();
        self.apply("load", outcome)
    }

    /// Add a product, creating the user's server cart first if needed.
    ///
    /// Returns whether the add and the follow-up re-fetch both succeeded.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId) -> bool {
        let _turn = self.in_flight.lock().await;
        let Some((token, pending)) = self.begin("add") else {
            return false;
        };
        let outcome = self.add_round_trip(&token, product_id).await;
        pending.settle();
        self.apply("add", outcome)
    }

    /// Remove a product from the server cart.
    ///
    /// Returns whether the removal and the follow-up re-fetch both succeeded.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: ProductId) -> bool {
        let _turn = self.in_flight.lock().await;
        let Some((token, pending)) = self.begin("remove") else {
            return false;
        };
        let outcome = self.remove_round_trip(&token, product_id).await;
        pending.settle();
        self.apply("remove", outcome)
    }

    /// Drop local state after a logout. No request is made.
    pub fn reset(&self) {
        self.write_state(|state| {
            state.items.clear();
            state.status = CartStatus::Unauthenticated;
        });
    }

    /// Gate on the stored token and enter `Loading`.
    ///
    /// Must run after taking the in-flight turn: the previous call may have
    /// logged out. The returned guard puts the previous status back if the
    /// caller drops the operation before it completes.
    fn begin(&self, operation: &'static str) -> Option<(SecretString, PendingRoundTrip<'_>)> {
        let Some(token) = self.session.token() else {
            debug!(operation, "No session, skipping cart request");
            self.reset();
            return None;
        };
        let mut previous = CartStatus::Loading;
        self.write_state(|state| {
            previous = std::mem::replace(&mut state.status, CartStatus::Loading);
        });
        Some((
            token,
            PendingRoundTrip {
                store: self,
                operation,
                previous: Some(previous),
            },
        ))
    }

    async fn fetch_round_trip(&self, token: &SecretString) -> Result<Vec<ProductId>, CartError> {
        let user = self.api.current_user(token).await?;
        match self.api.user_cart(token, user.id).await {
            Ok(cart) => Ok(cart.items),
            Err(e) if e.is_not_found() => {
                debug!(user_id = %user.id, "No server cart yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn add_round_trip(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, CartError> {
        let user = self.api.current_user(token).await?;
        self.ensure_cart(token, &user).await?;
        self.api.add_cart_item(token, user.id, product_id).await?;
        Ok(self.api.user_cart(token, user.id).await?.items)
    }

    async fn remove_round_trip(
        &self,
        token: &SecretString,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, CartError> {
        let user = self.api.current_user(token).await?;
        self.api.remove_cart_item(token, user.id, product_id).await?;
        Ok(self.api.user_cart(token, user.id).await?.items)
    }

    /// Make sure the user has a server cart, creating one on 404.
    async fn ensure_cart(&self, token: &SecretString, user: &User) -> Result<(), CartError> {
        match self.api.user_cart(token, user.id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                info!(user_id = %user.id, "Creating server cart");
                self.api.create_cart(token, user.id).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn apply(&self, operation: &'static str, outcome: Result<Vec<ProductId>, CartError>) -> bool {
        match outcome {
            Ok(items) => {
                debug!(operation, count = items.len(), "Cart synced");
                self.write_state(|state| {
                    state.items = items;
                    state.status = CartStatus::Synced;
                });
                true
            }
            Err(e) if e.is_unauthorized() => {
                info!(operation, "Session rejected by server, logging out");
                self.session.clear();
                self.reset();
                self.listener.session_expired();
                false
            }
            Err(e) => {
                warn!(operation, error = %e, "Cart operation failed");
                let message = e.user_message();
                self.write_state(|state| state.status = CartStatus::Error { message });
                false
            }
        }
    }
}

/// Marks a round-trip in flight. Dropped without [`PendingRoundTrip::settle`],
/// it leaves `Loading` for the status the store had before the call.
struct PendingRoundTrip<'a> {
    store: &'a CartStore,
    operation: &'static str,
    previous: Option<CartStatus>,
}

impl PendingRoundTrip<'_> {
    /// The round-trip finished; its outcome decides the next status.
    fn settle(mut self) {
        self.previous = None;
    }
}

impl Drop for PendingRoundTrip<'_> {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        debug!(operation = self.operation, "Cart operation cancelled");
        self.store.write_state(|state| {
            if state.status == CartStatus::Loading {
                state.status = previous;
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use mockito::{Matcher, Server, ServerGuard};

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::services::auth::{CREDENTIAL_KEY, StoredCredential};
    use crate::storage::{KeyValueStore, MemoryStore};

    #[derive(Default)]
    struct CountingListener(AtomicUsize);

    impl SessionListener for CountingListener {
        fn session_expired(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        storage: Arc<MemoryStore>,
        listener: Arc<CountingListener>,
        cart: CartStore,
    }

    fn harness(server: &ServerGuard, logged_in: bool) -> Harness {
        let storage = Arc::new(MemoryStore::new());
        let session = SessionStore::new(storage.clone());
        if logged_in {
            session.save(&StoredCredential::new("tok", "bearer")).unwrap();
        }
        let config = StorefrontConfig::with_api_url(&server.url()).unwrap();
        let api = ApiClient::new(&config).unwrap();
        let listener = Arc::new(CountingListener::default());
        let cart = CartStore::new(api, session, listener.clone());
        Harness {
            storage,
            listener,
            cart,
        }
    }

    async fn mock_me(server: &mut ServerGuard, user_id: i64) -> mockito::Mock {
        server
            .mock("GET", "/users/me")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(format!(r#"{{"id": {user_id}, "username": "ivan"}}"#))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_no_token_makes_no_request() {
        let mut server = Server::new_async().await;
        let mut guards = Vec::new();
        for method in ["GET", "POST", "DELETE"] {
            guards.push(
                server
                    .mock(method, Matcher::Any)
                    .expect(0)
                    .create_async()
                    .await,
            );
        }
        let h = harness(&server, false);

        assert!(!h.cart.add(ProductId::new(1)).await);
        assert!(!h.cart.remove(ProductId::new(1)).await);
        assert!(!h.cart.load().await);
        assert_eq!(h.cart.status(), CartStatus::Unauthenticated);
        assert!(h.cart.items().is_empty());

        for guard in guards {
            guard.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_load_adopts_server_cart() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"id": 1, "user_id": 9, "items": [3, 5]}"#)
            .create_async()
            .await;
        let h = harness(&server, true);

        assert!(h.cart.load().await);
        assert_eq!(h.cart.items(), vec![ProductId::new(3), ProductId::new(5)]);
        assert!(h.cart.is_in_cart(ProductId::new(5)));
        assert!(!h.cart.is_in_cart(ProductId::new(4)));
        assert_eq!(h.cart.status(), CartStatus::Synced);
    }

    #[tokio::test]
    async fn test_load_without_server_cart_is_empty_and_synced() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(404)
            .with_body(r#"{"detail": "Cart not found"}"#)
            .create_async()
            .await;
        let h = harness(&server, true);

        assert!(h.cart.load().await);
        assert!(h.cart.items().is_empty());
        assert_eq!(h.cart.status(), CartStatus::Synced);
    }

    #[tokio::test]
    async fn test_add_to_existing_cart_refetches() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        let first_read = server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [3]}"#)
            .expect(1)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/carts/user/9/items/7")
            .with_status(200)
            .with_body(r#"{"id": 1, "user_id": 9, "items": [3, 7]}"#)
            .expect(1)
            .create_async()
            .await;
        let h = harness(&server, true);

        // The pre-check read is matched first; the re-fetch falls through to
        // the newer mock below once the first is exhausted.
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [3, 7]}"#)
            .create_async()
            .await;

        assert!(h.cart.add(ProductId::new(7)).await);
        assert_eq!(h.cart.items(), vec![ProductId::new(3), ProductId::new(7)]);
        assert_eq!(h.cart.status(), CartStatus::Synced);
        first_read.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_add_creates_missing_cart() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(404)
            .with_body(r#"{"detail": "Cart not found"}"#)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/carts/")
            .match_body(Matcher::Json(serde_json::json!({"user_id": 9})))
            .with_status(201)
            .with_body(r#"{"id": 1, "user_id": 9, "items": []}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/carts/user/9/items/7")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"id": 1, "user_id": 9, "items": [7]}"#)
            .create_async()
            .await;
        let h = harness(&server, true);

        assert!(h.cart.add(ProductId::new(7)).await);
        assert_eq!(h.cart.items(), vec![ProductId::new(7)]);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_remove_refetches() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        let delete = server
            .mock("DELETE", "/carts/user/9/items/3")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [7]}"#)
            .create_async()
            .await;
        let h = harness(&server, true);

        assert!(h.cart.remove(ProductId::new(3)).await);
        assert_eq!(h.cart.items(), vec![ProductId::new(7)]);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_logs_out_once() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/users/me")
            .with_status(401)
            .with_body(r#"{"detail": "Could not validate credentials"}"#)
            .create_async()
            .await;
        let h = harness(&server, true);

        assert!(!h.cart.add(ProductId::new(7)).await);

        assert_eq!(h.listener.0.load(Ordering::SeqCst), 1);
        assert!(h.storage.get(CREDENTIAL_KEY).unwrap().is_none());
        assert_eq!(h.cart.status(), CartStatus::Unauthenticated);
        assert!(h.cart.items().is_empty());

        // The session is gone, so a retry short-circuits without a second redirect
        assert!(!h.cart.remove(ProductId::new(7)).await);
        assert_eq!(h.listener.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_mid_mutation_discards_cart() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [3]}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", "/carts/user/9/items/3")
            .with_status(401)
            .create_async()
            .await;
        let h = harness(&server, true);
        assert!(h.cart.load().await);
        assert_eq!(h.cart.items(), vec![ProductId::new(3)]);

        assert!(!h.cart.remove(ProductId::new(3)).await);
        assert!(h.cart.items().is_empty());
        assert_eq!(h.listener.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_keeps_items_and_stores_detail() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [3]}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/carts/user/9/items/404")
            .with_status(404)
            .with_body(r#"{"detail": "Product not found"}"#)
            .create_async()
            .await;
        let h = harness(&server, true);
        assert!(h.cart.load().await);

        assert!(!h.cart.add(ProductId::new(404)).await);
        assert_eq!(h.cart.error().as_deref(), Some("Product not found"));
        assert_eq!(h.cart.items(), vec![ProductId::new(3)]);
        assert_eq!(h.listener.0.load(Ordering::SeqCst), 0);
        assert!(!h.cart.is_loading());

        // The next success clears the error
        assert!(h.cart.load().await);
        assert_eq!(h.cart.error(), None);
    }

    #[tokio::test]
    async fn test_transport_error_message() {
        let server = Server::new_async().await;
        let mut h = harness(&server, true);
        // Nothing listens on port 9 locally; the connection is refused
        let config = StorefrontConfig::with_api_url("http://127.0.0.1:9/").unwrap();
        h.cart.api = ApiClient::new(&config).unwrap();

        assert!(!h.cart.add(ProductId::new(1)).await);
        let message = h.cart.error().unwrap();
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_each_round_trip() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [1, 2]}"#)
            .create_async()
            .await;
        let posts = server
            .mock("POST", Matcher::Regex(r"^/carts/user/9/items/\d+$".to_string()))
            .with_status(200)
            .expect(2)
            .create_async()
            .await;
        let h = harness(&server, true);

        let (a, b) = tokio::join!(h.cart.add(ProductId::new(1)), h.cart.add(ProductId::new(2)));
        assert!(a && b);
        assert_eq!(h.cart.status(), CartStatus::Synced);
        posts.assert_async().await;
    }

    #[tokio::test]
    async fn test_cancelled_add_restores_previous_status() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        server
            .mock("GET", "/carts/user/9")
            .with_status(200)
            .with_body(r#"{"items": [3]}"#)
            .create_async()
            .await;
        let h = harness(&server, true);
        assert!(h.cart.load().await);

        let outcome =
            tokio::time::timeout(Duration::ZERO, h.cart.add(ProductId::new(1))).await;
        assert!(outcome.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!h.cart.is_loading());
        assert_eq!(h.cart.status(), CartStatus::Synced);
        assert_eq!(h.cart.items(), vec![ProductId::new(3)]);

        // The store is usable again afterwards
        assert!(h.cart.load().await);
    }

    #[tokio::test]
    async fn test_racing_mutations_run_in_issue_order() {
        let mut server = Server::new_async().await;
        mock_me(&mut server, 9).await;
        // Pre-check read of add, then the re-fetch after add, then the
        // re-fetch after remove
        for body in [r#"{"items": []}"#, r#"{"items": [1]}"#, r#"{"items": []}"#] {
            server
                .mock("GET", "/carts/user/9")
                .with_status(200)
                .with_body(body)
                .expect(1)
                .create_async()
                .await;
        }
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let post_log = calls.clone();
        server
            .mock("POST", "/carts/user/9/items/1")
            .with_status(200)
            .with_body_from_request(move |_| {
                post_log.lock().unwrap().push("POST");
                Vec::new()
            })
            .expect(1)
            .create_async()
            .await;
        let delete_log = calls.clone();
        server
            .mock("DELETE", "/carts/user/9/items/1")
            .with_status(200)
            .with_body_from_request(move |_| {
                delete_log.lock().unwrap().push("DELETE");
                Vec::new()
            })
            .expect(1)
            .create_async()
            .await;
        let h = harness(&server, true);

        let (added, removed) = tokio::join!(
            h.cart.add(ProductId::new(1)),
            h.cart.remove(ProductId::new(1))
        );

        assert!(added && removed);
        assert_eq!(*calls.lock().unwrap(), vec!["POST", "DELETE"]);
        // Latest intent wins: the state is the re-fetch after the remove
        assert!(h.cart.items().is_empty());
        assert_eq!(h.cart.status(), CartStatus::Synced);
    }
}
