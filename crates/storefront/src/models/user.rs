//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use emporium_core::{Email, Role, Username};

/// A user account (domain type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Login name and primary key.
    pub username: Username,
    /// Contact address.
    pub email: Email,
    /// What the user may do.
    pub role: Role,
}

/// A user together with the stored password hash.
///
/// Only the auth service sees this type. `Debug` redacts the hash.
#[derive(Clone)]
pub struct UserRecord {
    /// The account.
    pub user: User,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("user", &self.user)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// The caller of a request, as carried by a verified token.
///
/// The role is the one the user had when the token was issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Who is calling.
    pub username: Username,
    /// Role at issuance.
    pub role: Role,
}

impl Identity {
    /// Whether this identity carries the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role,
        }
    }
}
