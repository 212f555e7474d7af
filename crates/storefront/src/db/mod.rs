//! Persistence for users, products, and orders.
//!
//! # Tables
//!
//! - `users` - Login accounts keyed by username
//! - `products` - The catalog, with a generated full-text search column
//! - `orders` - Placed orders, line items stored as JSONB
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```
//!
//! # Implementations
//!
//! Services talk to the [`Store`] trait. [`PgStore`] is the production
//! backend, [`MemoryStore`] backs tests and local experiments, and
//! [`RetryingStore`] wraps either one to retry transient read failures.

mod memory;
mod postgres;
mod retry;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use emporium_core::{ProductId, Quantity, Username};

use crate::models::{
    NewOrder, NewProduct, Order, PriceRange, Product, ProductPatch, ProductSort, User, UserRecord,
};

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;
pub use retry::{RetryPolicy, RetryingStore};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backend could not be reached. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Whether the failure is a connectivity problem rather than a verdict
    /// about the data.
    ///
    /// Connection-class SQLSTATEs (`08xxx`), serialization failures, deadlocks,
    /// and "cannot connect now" count as transient along with pool and I/O
    /// errors. Everything else is logical and retrying would not help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(err) => match err {
                sqlx::Error::Io(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => true,
                sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
                    code.starts_with("08") || matches!(code.as_ref(), "40001" | "40P01" | "57P03")
                }),
                _ => false,
            },
            Self::Unavailable(_) => true,
            Self::DataCorruption(_) | Self::NotFound | Self::Conflict(_) => false,
        }
    }
}

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockReservation {
    /// The units were taken.
    Reserved,
    /// Stock was below the requested quantity; nothing changed.
    Insufficient {
        /// Units on hand when the reservation was refused.
        available: i32,
    },
    /// No such product.
    Missing,
}

/// Storage operations the services need.
///
/// Every mutation is a single atomic statement against one record, so
/// implementations never need cross-record transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Look up an account and its password hash.
    async fn find_user(&self, username: &Username) -> Result<Option<UserRecord>, RepositoryError>;

    /// Create an account.
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError>;

    /// Fetch one product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products whose price falls in `range`, ordered by id.
    async fn list_products(&self, range: &PriceRange) -> Result<Vec<Product>, RepositoryError>;

    /// Products whose name or description matches any of the whitespace
    /// separated `terms`, ordered by id.
    async fn search_products(&self, terms: &str) -> Result<Vec<Product>, RepositoryError>;

    /// Every product in the requested order.
    async fn sort_products(&self, sort: ProductSort) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a product and return it with its assigned id.
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Apply a partial update. Returns `None` if no product has `id`.
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Delete a product. Returns whether a row was removed.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    /// Take `quantity` units if at least that many are in stock.
    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<StockReservation, RepositoryError>;

    /// Give back units taken by [`Store::reserve_stock`].
    async fn release_stock(&self, id: ProductId, quantity: Quantity)
    -> Result<(), RepositoryError>;

    /// Persist an order and return it with its assigned id.
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Orders placed by `username`, oldest first.
    async fn list_orders(&self, username: &Username) -> Result<Vec<Order>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
