//! Bazaar CLI - drive the storefront client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the password may also come from BAZAAR_PASSWORD)
//! bazaar login -u alice -p 'correct horse'
//!
//! # Favourite a product and list favourites
//! bazaar favourites add 12
//! bazaar favourites list
//!
//! # Work with the server cart
//! bazaar cart add 12
//! bazaar cart show
//! ```
//!
//! # Commands
//!
//! - `login`, `register`, `logout`, `whoami` - Session management
//! - `favourites list|add|remove` - Locally stored favourites
//! - `cart show|add|remove` - Server-side cart
//! - `product`, `category`, `categories` - Catalog lookups

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use bazaar_core::{CategoryId, ProductId};
use bazaar_storefront::AppState;
use bazaar_storefront::config::StorefrontConfig;
use bazaar_storefront::services::auth::NewAccount;
use bazaar_storefront::storage::FileStore;
use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account, then log in with it
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "BAZAAR_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(short, long)]
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Manage favourites
    Favourites {
        #[command(subcommand)]
        action: FavouritesAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show a product
    Product { id: ProductId },
    /// Show a category and its products
    Category { id: CategoryId },
    /// List categories
    Categories,
}

#[derive(Subcommand)]
enum FavouritesAction {
    /// List favourites
    List,
    /// Favourite a product
    Add { product: ProductId },
    /// Remove a product from favourites
    Remove { product: ProductId },
}

#[derive(Subcommand)]
enum CartAction {
    /// Fetch and show the cart
    Show,
    /// Add a product to the cart
    Add { product: ProductId },
    /// Remove a product from the cart
    Remove { product: ProductId },
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=info,bazaar_cli=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::debug!(error = %e, "Command failed");
        tracing::error!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> bazaar_storefront::Result<()> {
    let config = StorefrontConfig::from_env()?;
    let storage = Arc::new(FileStore::new(config.data_dir.clone()));
    let state = AppState::new(config, storage, Arc::new(commands::CliSessionListener))?;

    match cli.command {
        Commands::Login { username, password } => {
            commands::account::login(&state, &username, &SecretString::from(password)).await?;
        }
        Commands::Register {
            username,
            password,
            email,
            first_name,
            last_name,
        } => {
            let account = NewAccount {
                username,
                password: SecretString::from(password),
                email,
                first_name,
                last_name,
            };
            commands::account::register(&state, &account).await?;
        }
        Commands::Logout => commands::account::logout(&state),
        Commands::Whoami => commands::account::whoami(&state).await?,
        Commands::Favourites { action } => match action {
            FavouritesAction::List => commands::favourites::list(&state),
            FavouritesAction::Add { product } => commands::favourites::add(&state, product).await?,
            FavouritesAction::Remove { product } => commands::favourites::remove(&state, product),
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&state).await?,
            CartAction::Add { product } => commands::cart::add(&state, product).await?,
            CartAction::Remove { product } => commands::cart::remove(&state, product).await?,
        },
        Commands::Product { id } => commands::catalog::product(&state, id).await?,
        Commands::Category { id } => commands::catalog::category(&state, id).await?,
        Commands::Categories => commands::catalog::categories(&state).await?,
    }
    Ok(())
}
