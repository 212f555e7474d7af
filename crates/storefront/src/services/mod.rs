//! Business logic services for the storefront.
//!
//! Services borrow the store and caches from [`crate::state::AppState`] for
//! the duration of one request. They never see HTTP types.
//!
//! # Services
//!
//! - `auth` - Password login, identity tokens, role checks
//! - `catalog` - Product queries and admin-only mutations
//! - `orders` - Order placement with stock reservation

pub mod auth;
pub mod catalog;
pub mod orders;

pub use auth::{
    AuthError, AuthService, TokenIssuer, hash_password, register_user, require_role,
};
pub use catalog::{CatalogError, CatalogService};
pub use orders::{IdempotencyCache, OrderError, OrderService, idempotency_cache};
