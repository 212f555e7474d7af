//! Authentication service.
//!
//! Password login against Argon2 hashes, stateless signed tokens, and role
//! checks.

mod error;
mod token;

use std::sync::LazyLock;

pub use error::AuthError;
pub use token::TokenIssuer;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use emporium_core::{Email, Role, Username};

use crate::db::{RepositoryError, Store};
use crate::models::{Identity, User};

/// Minimum password length for newly provisioned accounts.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash verified when the username does not exist, so a miss costs as much
/// as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("emporium-dummy-password").ok());

/// Authentication service.
///
/// Handles login, token verification, and account provisioning.
pub struct AuthService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenIssuer,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store, tokens: &'a TokenIssuer) -> Self {
        Self { store, tokens }
    }

    /// Check a username and password and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the user does not exist or
    /// the password is wrong. The two cases are indistinguishable.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let Ok(username) = Username::parse(username) else {
            burn_dummy_verify(password);
            return Err(AuthError::InvalidCredentials);
        };

        let Some(record) = self.store.find_user(&username).await? else {
            burn_dummy_verify(password);
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &record.password_hash)?;

        let token = self.tokens.issue(&Identity::from(&record.user))?;
        tracing::info!(role = %record.user.role, "Login succeeded");
        Ok(token)
    }

    /// Verify a bearer token and return the caller's identity.
    ///
    /// Does not re-read the user record: the role is the one at issuance.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` or `AuthError::ExpiredToken`.
    pub fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.verify(token)
    }

    /// Create an account with a hashed password.
    ///
    /// # Errors
    ///
    /// See [`register_user`].
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        register_user(self.store, username, email, password, role).await
    }
}

/// Create an account with a hashed password.
///
/// Does not need a token issuer, so provisioning tools can call it with
/// just a store.
///
/// # Errors
///
/// Returns `AuthError::Account` if the username or email is invalid.
/// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
/// Returns `AuthError::UserAlreadyExists` if the username is taken.
#[instrument(skip(store, email, password))]
pub async fn register_user(
    store: &dyn Store,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, AuthError> {
    let user = User {
        username: Username::parse(username)?,
        email: Email::parse(email)?,
        role,
    };

    validate_password(password)?;
    let password_hash = hash_password(password)?;

    store
        .insert_user(&user, &password_hash)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

    tracing::info!(role = %user.role, "User created");
    Ok(user)
}

/// Fail with `Forbidden` unless `identity` has `role`.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` on a role mismatch.
pub fn require_role(identity: &Identity, role: Role) -> Result<(), AuthError> {
    if identity.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden { required: role })
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// Only empty passwords are refused here. Provisioning paths apply the
/// stricter length rule before calling this.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` for an empty password and
/// `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.is_empty() {
        return Err(AuthError::WeakPassword(
            "password cannot be empty".to_owned(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn burn_dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}
