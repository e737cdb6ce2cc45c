//! Wire types for the shop REST API.
//!
//! Deserialization is lenient: only the fields the client acts on are
//! required, everything else defaults when the server omits it.

use bazaar_core::{CartId, CategoryId, Price, ProductId, UserId};
use serde::{Deserialize, Deserializer, Serialize};

/// The authenticated account as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// A user's server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct CartRecord {
    #[serde(default)]
    pub id: Option<CartId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Product ids in server order.
    #[serde(default, deserialize_with = "deserialize_cart_items")]
    pub items: Vec<ProductId>,
}

/// Cart items arrive either as bare ids or as product objects carrying an
/// `id`, depending on the endpoint version.
#[derive(Deserialize)]
#[serde(untagged)]
enum CartItemRef {
    Id(ProductId),
    Object { id: ProductId },
}

fn deserialize_cart_items<'de, D>(deserializer: D) -> Result<Vec<ProductId>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<CartItemRef>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .map(|item| match item {
            CartItemRef::Id(id) | CartItemRef::Object { id } => id,
        })
        .collect())
}

/// Body of `POST /carts/`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NewCart {
    pub user_id: UserId,
}

/// A product from the catalog.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "image")]
    pub main_image: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Successful response of `POST /users/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

pub(crate) fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body of `POST /users/`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}
