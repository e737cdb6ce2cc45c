//! Cart commands.

use bazaar_core::ProductId;
use bazaar_storefront::services::cart::CartStatus;
use bazaar_storefront::{AppError, AppState};

#[allow(clippy::print_stdout)]
pub async fn show(state: &AppState) -> Result<(), AppError> {
    let synced = state.cart().load().await;
    outcome(state, synced)?;

    let items = state.cart().items();
    if items.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }
    for id in items {
        // Names are cosmetic; an unknown product still shows its id
        match state.catalog().product(id).await {
            Ok(product) => println!("{id:>6}  {:<40} {}", product.name, product.price),
            Err(e) => {
                tracing::debug!(product_id = %id, error = %e, "Could not resolve cart item");
                println!("{id:>6}  (unavailable)");
            }
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn add(state: &AppState, product_id: ProductId) -> Result<(), AppError> {
    let synced = state.cart().add(product_id).await;
    outcome(state, synced)?;
    println!("Cart now holds {} item(s)", state.cart().items().len());
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn remove(state: &AppState, product_id: ProductId) -> Result<(), AppError> {
    let synced = state.cart().remove(product_id).await;
    outcome(state, synced)?;
    println!("Cart now holds {} item(s)", state.cart().items().len());
    Ok(())
}

/// Turn a failed cart operation into the error the user sees.
fn outcome(state: &AppState, synced: bool) -> Result<(), AppError> {
    if synced {
        return Ok(());
    }
    match state.cart().status() {
        CartStatus::Error { message } => Err(AppError::CartFailed(message)),
        _ => Err(AppError::NotLoggedIn),
    }
}
