//! Business logic services for the storefront client.
//!
//! # Services
//!
//! - `auth` - Login, registration and the persisted session credential
//! - `cart` - Server-authoritative cart with re-fetch after every mutation
//! - `catalog` - Cached product and category lookups
//! - `favourites` - Locally persisted favourite product snapshots

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod favourites;
