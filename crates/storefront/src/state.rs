//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::CatalogCache;
use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::{
    AuthService, CatalogService, IdempotencyCache, OrderService, TokenIssuer, idempotency_cache,
};

/// Upper bound on remembered idempotency keys.
const MAX_IDEMPOTENCY_ENTRIES: u64 = 100_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store, caches, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    catalog_cache: CatalogCache,
    idempotency: IdempotencyCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Backing store (`PostgreSQL` in production, in-memory in tests)
    #[must_use]
    pub fn new(config: StorefrontConfig, store: Arc<dyn Store>) -> Self {
        let tokens = TokenIssuer::new(config.auth.token_secret.clone(), config.auth.token_ttl);
        let catalog_cache = CatalogCache::new(config.cache.ttl, config.cache.max_entries);
        let idempotency = idempotency_cache(config.orders.idempotency_ttl, MAX_IDEMPOTENCY_ENTRIES);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                catalog_cache,
                idempotency,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backing store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the token issuer.
    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    /// Get a reference to the product listing cache.
    #[must_use]
    pub fn catalog_cache(&self) -> &CatalogCache {
        &self.inner.catalog_cache
    }

    /// Authentication service borrowing this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.store(), self.tokens())
    }

    /// Catalog service borrowing this state.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.store(), self.catalog_cache())
    }

    /// Order service borrowing this state.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(
            Arc::clone(&self.inner.store),
            &self.inner.idempotency,
            self.inner.config.orders.enforce_stock,
        )
    }
}
