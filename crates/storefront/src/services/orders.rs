//! Order placement.
//!
//! An order is validated as a whole before anything is written: every line
//! must have a positive quantity and name an existing product. Prices are
//! read from the store at placement time; the client never supplies them,
//! and the owner is always the authenticated caller.
//!
//! With stock enforcement on, each line takes its units with a conditional
//! decrement. If any line cannot be reserved, or the order cannot be stored,
//! units already taken are given back before the error is returned.
//!
//! Reserving, storing, and compensating run on a spawned task that owns its
//! store handle. A caller that stops waiting (request timeout, client
//! disconnect) abandons the result, never the compensation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use thiserror::Error;
use tracing::{Instrument, instrument};

use emporium_core::{Price, ProductId, Quantity, Username};

use crate::db::{RepositoryError, StockReservation, Store};
use crate::models::{Identity, LineItem, NewOrder, Order, RequestedLine};

/// Longest accepted `Idempotency-Key`.
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// Orders remembered per `(username, idempotency key)`.
pub type IdempotencyCache = Cache<(Username, String), Order>;

/// Build an idempotency cache that remembers orders for `ttl`.
#[must_use]
pub fn idempotency_cache(ttl: Duration, max_entries: u64) -> IdempotencyCache {
    Cache::builder()
        .max_capacity(max_entries)
        .time_to_live(ttl)
        .build()
}

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request as a whole is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A line asked for zero or fewer units.
    #[error("invalid quantity {quantity} for product {product_id}: must be a positive integer")]
    InvalidQuantity {
        /// The product the line referenced.
        product_id: String,
        /// The rejected quantity.
        quantity: i64,
    },

    /// A line referenced a product that does not exist.
    #[error("product {0} not found")]
    ProductNotFound(String),

    /// Not enough units on hand for a line.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// The product that ran short.
        product_id: ProductId,
        /// Units the line asked for.
        requested: u32,
        /// Units on hand.
        available: i32,
    },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OrderError {
    /// Recover an owned error from one shared between coalesced requests.
    fn from_shared(shared: Arc<Self>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| match &*shared {
            Self::Validation(msg) => Self::Validation(msg.clone()),
            Self::InvalidQuantity {
                product_id,
                quantity,
            } => Self::InvalidQuantity {
                product_id: product_id.clone(),
                quantity: *quantity,
            },
            Self::ProductNotFound(id) => Self::ProductNotFound(id.clone()),
            Self::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id: *product_id,
                requested: *requested,
                available: *available,
            },
            Self::Repository(err) => Self::Repository(RepositoryError::Unavailable(err.to_string())),
        })
    }
}

/// Order placement and history.
pub struct OrderService<'a> {
    store: Arc<dyn Store>,
    idempotency: &'a IdempotencyCache,
    enforce_stock: bool,
}

impl<'a> OrderService<'a> {
    /// Create an order service.
    ///
    /// With `enforce_stock` off, stock is neither checked nor decremented.
    #[must_use]
    pub const fn new(
        store: Arc<dyn Store>,
        idempotency: &'a IdempotencyCache,
        enforce_stock: bool,
    ) -> Self {
        Self {
            store,
            idempotency,
            enforce_stock,
        }
    }

    /// Place an order for the caller.
    ///
    /// When `idempotency_key` is set, a repeat of the same key by the same
    /// user returns the first order instead of placing another. Concurrent
    /// repeats wait for the first placement. Failed placements are not
    /// remembered.
    ///
    /// # Errors
    ///
    /// - `OrderError::Validation` for an empty order, an overflowing total,
    ///   or a bad idempotency key
    /// - `OrderError::InvalidQuantity` for a line with quantity ≤ 0
    /// - `OrderError::ProductNotFound` for an unknown product
    /// - `OrderError::InsufficientStock` when stock is enforced and short
    #[instrument(skip_all, fields(username = %identity.username, lines = lines.len()))]
    pub async fn place_order(
        &self,
        identity: &Identity,
        lines: &[RequestedLine],
        idempotency_key: Option<&str>,
    ) -> Result<Order, OrderError> {
        let Some(key) = idempotency_key else {
            return self.place(identity, lines).await;
        };
        validate_idempotency_key(key)?;

        self.idempotency
            .try_get_with(
                (identity.username.clone(), key.to_owned()),
                self.place(identity, lines),
            )
            .await
            .map_err(OrderError::from_shared)
    }

    /// Orders placed by the caller, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list_orders(&self, identity: &Identity) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(&identity.username).await?)
    }

    async fn place(&self, identity: &Identity, lines: &[RequestedLine]) -> Result<Order, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one product".to_owned(),
            ));
        }

        let mut quantities = Vec::with_capacity(lines.len());
        for line in lines {
            let quantity =
                Quantity::new(line.quantity).map_err(|_| OrderError::InvalidQuantity {
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity,
                })?;
            quantities.push(quantity);
        }

        let mut line_items = Vec::with_capacity(lines.len());
        let mut total_price = Price::ZERO;
        for (line, quantity) in lines.iter().zip(quantities) {
            let not_found = || OrderError::ProductNotFound(line.product_id.to_string());
            let product_id = line.product_id.resolve().ok_or_else(not_found)?;
            let product = self
                .store
                .get_product(product_id)
                .await?
                .ok_or_else(not_found)?;

            total_price = product
                .price
                .times(quantity.get())
                .and_then(|subtotal| total_price.checked_add(subtotal))
                .ok_or_else(|| OrderError::Validation("order total is too large".to_owned()))?;
            line_items.push(LineItem {
                product_id,
                quantity,
            });
        }

        let order = NewOrder {
            user_id: identity.username.clone(),
            line_items,
            total_price,
            order_date: Utc::now(),
        };

        let commit = commit(Arc::clone(&self.store), order, self.enforce_stock);
        tokio::spawn(commit.in_current_span())
            .await
            .map_err(|err| RepositoryError::Unavailable(format!("order task failed: {err}")))?
    }
}

/// Reserve stock, store the order, and give the stock back if storing fails.
async fn commit(
    store: Arc<dyn Store>,
    order: NewOrder,
    enforce_stock: bool,
) -> Result<Order, OrderError> {
    let reserved = if enforce_stock {
        reserve_all(store.as_ref(), &order.line_items).await?
    } else {
        Vec::new()
    };

    match store.insert_order(&order).await {
        Ok(order) => {
            tracing::info!(
                order_id = %order.id,
                total_price = %order.total_price,
                "Order placed"
            );
            Ok(order)
        }
        Err(err) => {
            release_all(store.as_ref(), &reserved).await;
            Err(err.into())
        }
    }
}

/// Reserve every line or none.
async fn reserve_all(
    store: &dyn Store,
    line_items: &[LineItem],
) -> Result<Vec<LineItem>, OrderError> {
    let mut reserved = Vec::with_capacity(line_items.len());
    for item in line_items {
        let outcome = match store.reserve_stock(item.product_id, item.quantity).await {
            Ok(StockReservation::Reserved) => {
                reserved.push(*item);
                continue;
            }
            Ok(StockReservation::Insufficient { available }) => OrderError::InsufficientStock {
                product_id: item.product_id,
                requested: item.quantity.get(),
                available,
            },
            Ok(StockReservation::Missing) => {
                OrderError::ProductNotFound(item.product_id.to_string())
            }
            Err(err) => err.into(),
        };
        release_all(store, &reserved).await;
        return Err(outcome);
    }
    Ok(reserved)
}

/// Give back reserved units. Failures are logged; the caller's error takes
/// precedence.
async fn release_all(store: &dyn Store, reserved: &[LineItem]) {
    for item in reserved {
        if let Err(err) = store.release_stock(item.product_id, item.quantity).await {
            tracing::error!(
                product_id = %item.product_id,
                quantity = %item.quantity,
                error = %err,
                "Failed to release reserved stock"
            );
        }
    }
}

fn validate_idempotency_key(key: &str) -> Result<(), OrderError> {
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
        return Err(OrderError::Validation(format!(
            "Idempotency-Key must be 1 to {MAX_IDEMPOTENCY_KEY_LENGTH} characters"
        )));
    }
    if !key.chars().all(|c| c.is_ascii_graphic()) {
        return Err(OrderError::Validation(
            "Idempotency-Key must be printable ASCII without spaces".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use emporium_core::Role;

    use super::*;
    use crate::db::{FailPoint, MemoryStore};
    use crate::models::{NewProduct, ProductRef};

    fn customer() -> Identity {
        Identity {
            username: Username::parse("user1").unwrap(),
            role: Role::Customer,
        }
    }

    fn idempotency() -> IdempotencyCache {
        idempotency_cache(Duration::from_secs(3600), 100)
    }

    /// Seeds Tablet (id 1, 399.99 × 200) and Laptop (id 2, 1299.99 × 50).
    async fn seeded() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for (name, cents, quantity) in [("Tablet", 39_999, 200), ("Laptop", 129_999, 50)] {
            store
                .insert_product(&NewProduct {
                    name: name.to_owned(),
                    description: String::new(),
                    price: Price::new(Decimal::new(cents, 2)).unwrap(),
                    quantity_available: quantity,
                })
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    const TABLET: ProductId = ProductId::new(1);
    const LAPTOP: ProductId = ProductId::new(2);

    async fn stock(store: &MemoryStore, id: ProductId) -> i32 {
        store.get_product(id).await.unwrap().unwrap().quantity_available
    }

    #[tokio::test]
    async fn test_total_uses_store_prices() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);

        let order = orders
            .place_order(
                &customer(),
                &[RequestedLine::new(TABLET, 2), RequestedLine::new(LAPTOP, 1)],
                None,
            )
            .await
            .unwrap();

        assert_eq!(order.total_price.amount(), Decimal::new(209_997, 2));
        assert_eq!(order.user_id.as_str(), "user1");
        assert_eq!(order.line_items.len(), 2);
        assert_eq!(stock(&store, TABLET).await, 198);
        assert_eq!(stock(&store, LAPTOP).await, 49);
    }

    #[tokio::test]
    async fn test_unknown_product_persists_nothing() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);

        let lines = [
            RequestedLine::new(TABLET, 1),
            RequestedLine {
                product_id: ProductRef::Text("X9".to_owned()),
                quantity: 1,
            },
        ];
        let err = orders.place_order(&customer(), &lines, None).await.unwrap_err();

        assert!(matches!(err, OrderError::ProductNotFound(ref id) if id == "X9"));
        assert!(store.all_orders().await.is_empty());
        assert_eq!(store.call_count(FailPoint::ReserveStock), 0);
        assert_eq!(stock(&store, TABLET).await, 200);
    }

    #[tokio::test]
    async fn test_quantity_checked_before_store_access() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);

        let err = orders
            .place_order(
                &customer(),
                &[RequestedLine::new(TABLET, 1), RequestedLine::new(LAPTOP, 0)],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InvalidQuantity { quantity: 0, .. }));
        assert_eq!(store.call_count(FailPoint::GetProduct), 0);
    }

    #[tokio::test]
    async fn test_empty_order_is_rejected() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);

        assert!(matches!(
            orders.place_order(&customer(), &[], None).await,
            Err(OrderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_insufficient_stock_releases_earlier_lines() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);

        let err = orders
            .place_order(
                &customer(),
                &[RequestedLine::new(TABLET, 5), RequestedLine::new(LAPTOP, 51)],
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock {
                product_id: LAPTOP,
                requested: 51,
                available: 50
            }
        ));
        assert_eq!(stock(&store, TABLET).await, 200);
        assert_eq!(stock(&store, LAPTOP).await, 50);
        assert!(store.all_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_releases_stock() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        store.fail_next(FailPoint::InsertOrder, 1);

        let err = orders
            .place_order(&customer(), &[RequestedLine::new(LAPTOP, 3)], None)
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Repository(_)));
        assert_eq!(stock(&store, LAPTOP).await, 50);
    }

    #[tokio::test]
    async fn test_abandoned_placement_still_settles_stock() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        store.delay_next(FailPoint::InsertOrder, Duration::from_millis(300));
        store.fail_next(FailPoint::InsertOrder, 1);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            orders.place_order(&customer(), &[RequestedLine::new(LAPTOP, 10)], None),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(stock(&store, LAPTOP).await, 50);
        assert!(store.all_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_placement_keeps_stored_order_consistent() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        store.delay_next(FailPoint::InsertOrder, Duration::from_millis(300));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            orders.place_order(&customer(), &[RequestedLine::new(LAPTOP, 10)], None),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let stored = store.all_orders().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stock(&store, LAPTOP).await, 40);
    }

    #[tokio::test]
    async fn test_stock_untouched_when_not_enforced() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, false);

        orders
            .place_order(&customer(), &[RequestedLine::new(LAPTOP, 500)], None)
            .await
            .unwrap();

        assert_eq!(stock(&store, LAPTOP).await, 50);
        assert_eq!(store.call_count(FailPoint::ReserveStock), 0);
    }

    #[tokio::test]
    async fn test_concurrent_orders_never_oversell() {
        let store = seeded().await;
        let cache = Arc::new(idempotency());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                OrderService::new(store, &cache, true)
                    .place_order(&customer(), &[RequestedLine::new(LAPTOP, 3)], None)
                    .await
                    .is_ok()
            }));
        }

        let mut placed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                placed += 1;
            }
        }

        // 50 units, 3 per order: 16 orders fit.
        assert_eq!(placed, 16);
        assert_eq!(stock(&store, LAPTOP).await, 2);
        assert_eq!(store.all_orders().await.len(), 16);
    }

    #[tokio::test]
    async fn test_idempotency_key_returns_first_order() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        let lines = [RequestedLine::new(TABLET, 1)];

        let first = orders
            .place_order(&customer(), &lines, Some("checkout-7f3a"))
            .await
            .unwrap();
        let second = orders
            .place_order(&customer(), &lines, Some("checkout-7f3a"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.all_orders().await.len(), 1);
        assert_eq!(stock(&store, TABLET).await, 199);
    }

    #[tokio::test]
    async fn test_idempotency_keys_are_per_user() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        let other = Identity {
            username: Username::parse("user2").unwrap(),
            role: Role::Customer,
        };
        let lines = [RequestedLine::new(TABLET, 1)];

        let first = orders
            .place_order(&customer(), &lines, Some("same-key"))
            .await
            .unwrap();
        let second = orders
            .place_order(&other, &lines, Some("same-key"))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(second.user_id.as_str(), "user2");
    }

    #[tokio::test]
    async fn test_failed_placement_is_not_remembered() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        store.fail_next(FailPoint::InsertOrder, 1);
        let lines = [RequestedLine::new(TABLET, 1)];

        assert!(
            orders
                .place_order(&customer(), &lines, Some("retry-me"))
                .await
                .is_err()
        );
        let order = orders
            .place_order(&customer(), &lines, Some("retry-me"))
            .await
            .unwrap();
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(store.all_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_idempotency_keys() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        let lines = [RequestedLine::new(TABLET, 1)];
        let too_long = "k".repeat(MAX_IDEMPOTENCY_KEY_LENGTH + 1);

        for key in ["", "has space", too_long.as_str()] {
            assert!(matches!(
                orders.place_order(&customer(), &lines, Some(key)).await,
                Err(OrderError::Validation(_))
            ));
        }
        assert!(store.all_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_is_scoped_to_caller() {
        let store = seeded().await;
        let cache = idempotency();
        let orders = OrderService::new(store.clone(), &cache, true);
        let other = Identity {
            username: Username::parse("user2").unwrap(),
            role: Role::Customer,
        };

        orders
            .place_order(&customer(), &[RequestedLine::new(TABLET, 1)], None)
            .await
            .unwrap();
        orders
            .place_order(&other, &[RequestedLine::new(LAPTOP, 1)], None)
            .await
            .unwrap();

        let mine = orders.list_orders(&customer()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].line_items[0].product_id, TABLET);
    }
}
