//! Application state shared by every front-end.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::services::auth::{AuthService, SessionListener, SessionStore};
use crate::services::cart::CartStore;
use crate::services::catalog::CatalogService;
use crate::services::favourites::FavouritesStore;
use crate::storage::KeyValueStore;

/// Application state shared across the client.
///
/// This struct is cheaply cloneable via `Arc` and wires the services to one
/// API client and one storage backend, so the cart and the auth flow always
/// see the same credential.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    auth: AuthService,
    catalog: CatalogService,
    favourites: FavouritesStore,
    cart: CartStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `storage` - Backend for the credential and the favourites document
    /// * `listener` - Notified when the server rejects the stored credential
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        storage: Arc<dyn KeyValueStore>,
        listener: Arc<dyn SessionListener>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        let session = SessionStore::new(storage.clone());
        let auth = AuthService::new(api.clone(), session.clone());
        let catalog = CatalogService::new(api.clone(), config.catalog_cache_ttl);
        let favourites = FavouritesStore::load(storage);
        let cart = CartStore::new(api.clone(), session, listener);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                auth,
                catalog,
                favourites,
                cart,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the raw API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn favourites(&self) -> &FavouritesStore {
        &self.inner.favourites
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Drop the credential and the cached cart together.
    pub fn logout(&self) {
        self.inner.auth.logout();
        self.inner.cart.reset();
    }
}
