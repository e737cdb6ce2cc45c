//! Bazaar storefront client library.
//!
//! Client-side state for a shop backed by a REST cart API: a persisted
//! favourites set, a server-authoritative cart, the login session and cached
//! catalog lookups. Front-ends build one `AppState` and drive the services
//! through it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod storage;

pub use error::{AppError, Result};
pub use state::AppState;
