//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness check
//! GET    /health/ready         - Readiness check (store ping)
//!
//! # Auth
//! POST   /login                - Exchange credentials for a token
//!
//! # Products
//! GET    /products             - Listing, optional min_price/max_price (cached)
//! GET    /products/filter      - Same as /products
//! GET    /products/search      - Full-text search (?query=)
//! GET    /products/sort        - Sorted listing (?sort_field=&sort_order=1|-1)
//! POST   /products             - Create (admin)
//! PUT    /products/{id}        - Partial update (admin)
//! DELETE /products/{id}        - Delete (admin)
//!
//! # Orders (requires auth)
//! GET    /orders               - Caller's orders
//! POST   /orders               - Place an order (optional Idempotency-Key)
//! ```

pub mod auth;
pub mod extract;
pub mod health;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the router with every API route.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/login", post(auth::login))
        .route("/products", get(products::list).post(products::create))
        .route("/products/filter", get(products::list))
        .route("/products/search", get(products::search))
        .route("/products/sort", get(products::sort))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route("/orders", get(orders::list).post(orders::place))
}
