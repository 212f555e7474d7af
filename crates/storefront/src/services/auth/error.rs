//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No bearer token on a request that needs one.
    #[error("missing token")]
    MissingToken,

    /// Token is malformed or its signature does not verify.
    #[error("invalid token")]
    InvalidToken,

    /// Token signature is valid but `exp` has passed.
    #[error("token expired")]
    ExpiredToken,

    /// Authenticated, but the role does not permit the operation.
    #[error("forbidden: requires {required} role")]
    Forbidden {
        /// Role the operation needs.
        required: emporium_core::Role,
    },

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Invalid username, email, or role.
    #[error("invalid account: {0}")]
    Account(#[from] emporium_core::AccountError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be signed.
    #[error("token signing error")]
    Signing,
}
