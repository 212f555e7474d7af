//! Retry wrapper for transient store failures.
//!
//! Only idempotent reads are retried. A write that failed with a connection
//! error may still have committed, so writes pass straight through.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use emporium_core::{ProductId, Quantity, Username};

use super::{RepositoryError, StockReservation, Store};
use crate::models::{
    NewOrder, NewProduct, Order, PriceRange, Product, ProductPatch, ProductSort, User, UserRecord,
};

/// How hard to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per call, including the first.
    pub attempts: u32,
    /// Delay before the second try. Doubles on each further try.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed try number `attempt` (zero-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// A [`Store`] that retries transient failures of read operations.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Store> RetryingStore<S> {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, RepositoryError>> + Send,
        T: Send,
    {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: Store> Store for RetryingStore<S> {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.with_retry("ping", || self.inner.ping()).await
    }

    async fn find_user(&self, username: &Username) -> Result<Option<UserRecord>, RepositoryError> {
        self.with_retry("find_user", || self.inner.find_user(username)).await
    }

    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError> {
        self.inner.insert_user(user, password_hash).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.with_retry("get_product", || self.inner.get_product(id)).await
    }

    async fn list_products(&self, range: &PriceRange) -> Result<Vec<Product>, RepositoryError> {
        self.with_retry("list_products", || self.inner.list_products(range)).await
    }

    async fn search_products(&self, terms: &str) -> Result<Vec<Product>, RepositoryError> {
        self.with_retry("search_products", || self.inner.search_products(terms)).await
    }

    async fn sort_products(&self, sort: ProductSort) -> Result<Vec<Product>, RepositoryError> {
        self.with_retry("sort_products", || self.inner.sort_products(sort)).await
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        self.inner.insert_product(product).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        self.inner.update_product(id, patch).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.inner.delete_product(id).await
    }

    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<StockReservation, RepositoryError> {
        self.inner.reserve_stock(id, quantity).await
    }

    async fn release_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        self.inner.release_stock(id, quantity).await
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.inner.insert_order(order).await
    }

    async fn list_orders(&self, username: &Username) -> Result<Vec<Order>, RepositoryError> {
        self.with_retry("list_orders", || self.inner.list_orders(username)).await
    }
}
