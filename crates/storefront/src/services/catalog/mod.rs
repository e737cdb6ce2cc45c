//! Catalog lookups.
//!
//! Read-only access to products and categories with an in-memory `moka`
//! cache. The favourites flow uses it to snapshot a product before storing it.

mod cache;

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{CategoryId, ProductId};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::api::{ApiClient, ApiError, Category, Product};

use cache::{CacheKey, CacheValue};

/// Upper bound on cached entries.
const CACHE_CAPACITY: u64 = 1000;

/// Errors returned by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Api(ApiError),
}

impl CatalogError {
    fn from_api(err: ApiError, what: impl FnOnce() -> String) -> Self {
        if err.is_not_found() {
            Self::NotFound(what())
        } else {
            Self::Api(err)
        }
    }
}

/// Cached catalog client.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self {
            inner: Arc::new(CatalogServiceInner { api, cache }),
        }
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id, or the API error.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Product, CatalogError> {
        let key = CacheKey::Product(id);
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self
            .inner
            .api
            .product(id)
            .await
            .map_err(|e| CatalogError::from_api(e, || format!("product {id}")))?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Get a category by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id, or the API error.
    #[instrument(skip(self))]
    pub async fn category(&self, id: CategoryId) -> Result<Category, CatalogError> {
        let key = CacheKey::Category(id);
        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for category");
            return Ok(*category);
        }

        let category = self
            .inner
            .api
            .category(id)
            .await
            .map_err(|e| CatalogError::from_api(e, || format!("category {id}")))?;

        self.inner
            .cache
            .insert(key, CacheValue::Category(Box::new(category.clone())))
            .await;
        Ok(category)
    }

    /// List the products of a category.
    ///
    /// # Errors
    ///
    /// Returns the API error if the request fails.
    #[instrument(skip(self))]
    pub async fn category_products(&self, id: CategoryId) -> Result<Vec<Product>, CatalogError> {
        let key = CacheKey::CategoryProducts(id);
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for category products");
            return Ok(products);
        }

        let products = self
            .inner
            .api
            .products_in_category(id)
            .await
            .map_err(|e| CatalogError::from_api(e, || format!("category {id}")))?;

        self.inner
            .cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns the API error if the request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = self
            .inner
            .api
            .categories()
            .await
            .map_err(CatalogError::Api)?;

        self.inner
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }
}
