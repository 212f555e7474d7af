//! User provisioning commands.
//!
//! # Usage
//!
//! ```bash
//! emporium user create -u admin -e admin@example.com -p 's3cure-pass' -r admin
//! ```

use emporium_core::Role;
use emporium_storefront::db::PgStore;
use emporium_storefront::services::{AuthError, register_user};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, customer")]
    InvalidRole(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create a user with an Argon2-hashed password.
///
/// # Errors
///
/// Returns `UserError` for an invalid role, username, email, or password,
/// or if the username is taken.
pub async fn create(
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<(), UserError> {
    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    let store = PgStore::new(connect().await?);
    let user = register_user(&store, username, email, password, role).await?;

    tracing::info!(
        "User created successfully! Username: {}, Role: {}",
        user.username,
        user.role
    );
    Ok(())
}
