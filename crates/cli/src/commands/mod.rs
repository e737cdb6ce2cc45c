//! Command implementations.
//!
//! Output goes to stdout; diagnostics go through `tracing` to stderr.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod favourites;

use bazaar_storefront::services::auth::SessionListener;

/// Tells the user to sign in again when the server rejects the session.
pub struct CliSessionListener;

impl SessionListener for CliSessionListener {
    fn session_expired(&self) {
        tracing::warn!("Your session has expired. Run `bazaar login` to sign in again.");
    }
}
