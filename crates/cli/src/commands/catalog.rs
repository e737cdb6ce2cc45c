//! Catalog lookups.

use bazaar_core::{CategoryId, ProductId};
use bazaar_storefront::{AppError, AppState};

#[allow(clippy::print_stdout)]
pub async fn product(state: &AppState, id: ProductId) -> Result<(), AppError> {
    let product = state.catalog().product(id).await?;
    let favourite = if state.favourites().is_favourite(id) { " *" } else { "" };
    println!("{}{favourite}", product.name);
    println!("  id:       {}", product.id);
    println!("  price:    {}", product.price);
    if let Some(category) = product.category_id {
        println!("  category: {category}");
    }
    if let Some(rating) = product.rating {
        println!("  rating:   {rating:.1}");
    }
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        println!();
        println!("{description}");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn category(state: &AppState, id: CategoryId) -> Result<(), AppError> {
    let category = state.catalog().category(id).await?;
    let products = state.catalog().category_products(id).await?;
    println!("{} ({} products)", category.name, products.len());
    for product in products {
        println!("{:>6}  {:<40} {}", product.id, product.name, product.price);
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn categories(state: &AppState) -> Result<(), AppError> {
    for category in state.catalog().categories().await? {
        println!("{:>6}  {}", category.id, category.name);
    }
    Ok(())
}
