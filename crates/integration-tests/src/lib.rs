//! Integration tests for Emporium.
//!
//! Tests drive the full storefront router in-process with
//! `tower::ServiceExt::oneshot`, backed by `MemoryStore`. No database or
//! network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p emporium-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - Login, tokens, and role checks over HTTP
//! - `catalog` - Product routes and cache coherence
//! - `orders` - Order placement, stock, and idempotency
//! - `health` - Health checks and request IDs

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use emporium_core::{Email, Price, Role, Username};
use emporium_storefront::config::{AuthConfig, CacheConfig, OrdersConfig, StorefrontConfig};
use emporium_storefront::db::{MemoryStore, RetryPolicy, Store};
use emporium_storefront::models::{Identity, NewProduct, Product, User};
use emporium_storefront::services::hash_password;
use emporium_storefront::state::AppState;

/// Signing secret used by every test app.
pub const TEST_TOKEN_SECRET: &str = "kR9#vQ2$wL7!pX4@mN8&zT1*bY6^cH3%";

/// Configuration for an in-process app.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        request_timeout: Duration::from_secs(10),
        auth: AuthConfig {
            token_secret: SecretString::from(TEST_TOKEN_SECRET),
            token_ttl: Duration::from_secs(900),
        },
        cache: CacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 1000,
        },
        orders: OrdersConfig {
            enforce_stock: true,
            idempotency_ttl: Duration::from_secs(3600),
        },
        retry: RetryPolicy::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A storefront router over a fresh `MemoryStore`.
#[derive(Clone)]
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    router: Router,
}

/// A response with its body parsed as JSON (or `Null` if it isn't JSON).
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// The `message` field of the body.
    #[must_use]
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    /// App with the default test configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// App with a custom configuration.
    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, Arc::clone(&store) as Arc<dyn Store>);
        let router = emporium_storefront::app(state.clone());
        Self {
            store,
            state,
            router,
        }
    }

    /// Create an account directly in the store.
    pub async fn create_user(&self, username: &str, password: &str, role: Role) {
        let user = User {
            username: Username::parse(username).unwrap(),
            email: Email::parse(&format!("{username}@example.com")).unwrap(),
            role,
        };
        let hash = hash_password(password).unwrap();
        self.store.insert_user(&user, &hash).await.unwrap();
    }

    /// Create a product directly in the store, bypassing the cache.
    pub async fn create_product(&self, name: &str, cents: i64, quantity: i32) -> Product {
        self.store
            .insert_product(&NewProduct {
                name: name.to_string(),
                description: format!("A {} for testing", name.to_lowercase()),
                price: price(cents),
                quantity_available: quantity,
            })
            .await
            .unwrap()
    }

    /// Mint a token without going through `/login`.
    #[must_use]
    pub fn token(&self, username: &str, role: Role) -> String {
        self.state
            .tokens()
            .issue(&Identity {
                username: Username::parse(username).unwrap(),
                role,
            })
            .unwrap()
    }

    /// Token for an admin named `admin`.
    #[must_use]
    pub fn admin_token(&self) -> String {
        self.token("admin", Role::Admin)
    }

    /// Token for a customer named `user1`.
    #[must_use]
    pub fn customer_token(&self) -> String {
        self.token("user1", Role::Customer)
    }

    /// Send a request, optionally with a bearer token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Send a prepared request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `GET` without a token.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, None).await
    }

    /// Current stock of a product, read from the store.
    pub async fn stock(&self, product: &Product) -> i32 {
        self.store
            .get_product(product.id)
            .await
            .unwrap()
            .unwrap()
            .quantity_available
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A price from a count of cents.
#[must_use]
pub fn price(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2)).unwrap()
}

/// A JSON number as a two-place decimal.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    value.to_string().parse::<Decimal>().unwrap().round_dp(2)
}
