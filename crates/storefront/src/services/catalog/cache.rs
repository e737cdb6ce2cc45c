//! Cache types for catalog responses.

use bazaar_core::{CategoryId, ProductId};

use crate::api::{Category, Product};

/// Cache key for products and categories.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Category(CategoryId),
    CategoryProducts(CategoryId),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Category(Box<Category>),
    Products(Vec<Product>),
    Categories(Vec<Category>),
}
