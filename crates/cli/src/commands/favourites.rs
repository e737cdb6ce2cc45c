//! Favourites commands.

use bazaar_core::ProductId;
use bazaar_storefront::services::favourites::FavouriteItem;
use bazaar_storefront::{AppError, AppState};

#[allow(clippy::print_stdout)]
pub fn list(state: &AppState) {
    let items = state.favourites().items();
    if items.is_empty() {
        println!("No favourites yet");
        return;
    }
    for item in items {
        println!("{:>6}  {:<40} {}", item.id, item.name, item.price);
    }
}

/// Snapshot the product as it is now and favourite it.
#[allow(clippy::print_stdout)]
pub async fn add(state: &AppState, product_id: ProductId) -> Result<(), AppError> {
    let product = state.catalog().product(product_id).await?;
    if state.favourites().add(FavouriteItem::from(&product)) {
        println!("Added {} to favourites", product.name);
    } else {
        println!("{} is already a favourite", product.name);
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn remove(state: &AppState, product_id: ProductId) {
    if state.favourites().remove(product_id) {
        println!("Removed product {product_id} from favourites");
    } else {
        println!("Product {product_id} is not a favourite");
    }
}
