//! Session commands: login, register, logout, whoami.

use bazaar_storefront::api::User;
use bazaar_storefront::services::auth::NewAccount;
use bazaar_storefront::{AppError, AppState};
use secrecy::SecretString;

pub async fn login(state: &AppState, username: &str, password: &SecretString) -> Result<(), AppError> {
    let user = state.auth().login(username, password).await?;
    print_user("Logged in as", &user);
    Ok(())
}

pub async fn register(state: &AppState, account: &NewAccount) -> Result<(), AppError> {
    let user = state.auth().register(account).await?;
    print_user("Registered and logged in as", &user);
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn logout(state: &AppState) {
    state.logout();
    println!("Logged out");
}

pub async fn whoami(state: &AppState) -> Result<(), AppError> {
    match state.auth().whoami().await? {
        Some(user) => {
            print_user("Logged in as", &user);
            Ok(())
        }
        None => Err(AppError::NotLoggedIn),
    }
}

#[allow(clippy::print_stdout)]
fn print_user(prefix: &str, user: &User) {
    println!("{prefix} {} (id {})", user.username, user.id);
    if !user.email.is_empty() {
        println!("  email: {}", user.email);
    }
    let name = format!("{} {}", user.first_name, user.last_name);
    if !name.trim().is_empty() {
        println!("  name:  {}", name.trim());
    }
}
