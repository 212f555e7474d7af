//! Account identity types: usernames, email addresses, and roles.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised while validating account fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Username is empty or whitespace.
    #[error("username cannot be empty")]
    EmptyUsername,
    /// Username exceeds the maximum length.
    #[error("username must be at most {max} characters")]
    UsernameTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Username contains characters outside `[A-Za-z0-9_.-]`.
    #[error("username may only contain letters, digits, '_', '.' and '-'")]
    UsernameCharacters,
    /// Email is structurally invalid.
    #[error("invalid email address: {0}")]
    InvalidEmail(&'static str),
    /// Unknown role name.
    #[error("invalid role: {0} (expected 'admin' or 'customer')")]
    InvalidRole(String),
}

/// A login name. Unique per user and used as the order owner key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Maximum username length.
    pub const MAX_LENGTH: usize = 64;

    /// Validate a username.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than
    /// [`Username::MAX_LENGTH`], or contains disallowed characters.
    pub fn parse(s: &str) -> Result<Self, AccountError> {
        if s.trim().is_empty() {
            return Err(AccountError::EmptyUsername);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(AccountError::UsernameTooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(AccountError::UsernameCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// The username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An email address with a non-empty local part and domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Validate an email address.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidEmail`] if the input is empty, too long,
    /// lacks exactly one `@`, or has an empty local part or domain.
    pub fn parse(s: &str) -> Result<Self, AccountError> {
        if s.is_empty() {
            return Err(AccountError::InvalidEmail("empty"));
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(AccountError::InvalidEmail("too long"));
        }
        let Some((local, domain)) = s.split_once('@') else {
            return Err(AccountError::InvalidEmail("missing @"));
        };
        if local.is_empty() {
            return Err(AccountError::InvalidEmail("empty local part"));
        }
        if domain.is_empty() || domain.contains('@') {
            return Err(AccountError::InvalidEmail("bad domain"));
        }
        Ok(Self(s.to_owned()))
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May mutate the catalog.
    Admin,
    /// May browse and place orders.
    #[default]
    Customer,
}

impl Role {
    /// The wire/database name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            other => Err(AccountError::InvalidRole(other.to_owned())),
        }
    }
}
