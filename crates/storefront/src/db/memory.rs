//! In-process implementation of [`Store`].
//!
//! Used by the test suites and for running the API without a database. All
//! tables sit behind one `RwLock`, so every operation is atomic with respect
//! to every other. Failures and delays can be injected per operation to
//! exercise retry, compensation, and cancellation paths.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use emporium_core::{OrderId, ProductId, Quantity, Username};

use super::{RepositoryError, StockReservation, Store};
use crate::models::{
    NewOrder, NewProduct, Order, PriceRange, Product, ProductPatch, ProductSort, SortField,
    SortOrder, User, UserRecord,
};

/// Store operations that can be observed and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Ping,
    FindUser,
    InsertUser,
    GetProduct,
    ListProducts,
    SearchProducts,
    SortProducts,
    InsertProduct,
    UpdateProduct,
    DeleteProduct,
    ReserveStock,
    ReleaseStock,
    InsertOrder,
    ListOrders,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<Username, UserRecord>,
    products: BTreeMap<ProductId, Product>,
    orders: Vec<Order>,
    last_product_id: i32,
    last_order_id: i32,
}

#[derive(Default)]
struct Probe {
    calls: HashMap<FailPoint, u32>,
    pending_failures: HashMap<FailPoint, u32>,
    pending_delays: HashMap<FailPoint, Duration>,
}

/// Store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    probe: Mutex<Probe>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `point` fail with a transient error.
    pub fn fail_next(&self, point: FailPoint, count: u32) {
        if let Ok(mut probe) = self.probe.lock() {
            *probe.pending_failures.entry(point).or_default() += count;
        }
    }

    /// Make the next call of `point` sleep for `delay` before it runs.
    pub fn delay_next(&self, point: FailPoint, delay: Duration) {
        if let Ok(mut probe) = self.probe.lock() {
            probe.pending_delays.insert(point, delay);
        }
    }

    /// How many times `point` has been called, including failed calls.
    #[must_use]
    pub fn call_count(&self, point: FailPoint) -> u32 {
        self.probe
            .lock()
            .map(|probe| probe.calls.get(&point).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Every order in the store, regardless of owner.
    pub async fn all_orders(&self) -> Vec<Order> {
        self.tables.read().await.orders.clone()
    }

    async fn enter(&self, point: FailPoint) -> Result<(), RepositoryError> {
        let (delay, outcome) = {
            let Ok(mut probe) = self.probe.lock() else {
                return Err(RepositoryError::Unavailable("probe lock poisoned".to_owned()));
            };
            *probe.calls.entry(point).or_default() += 1;
            let outcome = match probe.pending_failures.get_mut(&point) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Err(RepositoryError::Unavailable(format!(
                        "injected failure at {point:?}"
                    )))
                }
                _ => Ok(()),
            };
            (probe.pending_delays.remove(&point), outcome)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

fn matches_any_term(product: &Product, terms: &[String]) -> bool {
    let name = product.name.to_lowercase();
    let description = product.description.to_lowercase();
    terms
        .iter()
        .any(|term| name.contains(term.as_str()) || description.contains(term.as_str()))
}

fn compare_by(field: SortField, a: &Product, b: &Product) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Name => a.name.cmp(&b.name),
        SortField::Description => a.description.cmp(&b.description),
        SortField::Price => a.price.cmp(&b.price),
        SortField::QuantityAvailable => a.quantity_available.cmp(&b.quantity_available),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.enter(FailPoint::Ping).await
    }

    async fn find_user(&self, username: &Username) -> Result<Option<UserRecord>, RepositoryError> {
        self.enter(FailPoint::FindUser).await?;
        Ok(self.tables.read().await.users.get(username).cloned())
    }

    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError> {
        self.enter(FailPoint::InsertUser).await?;
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.username) {
            return Err(RepositoryError::Conflict(
                "username already exists".to_owned(),
            ));
        }
        tables.users.insert(
            user.username.clone(),
            UserRecord {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.enter(FailPoint::GetProduct).await?;
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, range: &PriceRange) -> Result<Vec<Product>, RepositoryError> {
        self.enter(FailPoint::ListProducts).await?;
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .filter(|p| range.contains(p.price))
            .cloned()
            .collect())
    }

    async fn search_products(&self, terms: &str) -> Result<Vec<Product>, RepositoryError> {
        self.enter(FailPoint::SearchProducts).await?;
        let terms: Vec<String> = terms.split_whitespace().map(str::to_lowercase).collect();
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .filter(|p| matches_any_term(p, &terms))
            .cloned()
            .collect())
    }

    async fn sort_products(&self, sort: ProductSort) -> Result<Vec<Product>, RepositoryError> {
        self.enter(FailPoint::SortProducts).await?;
        let mut products: Vec<Product> =
            self.tables.read().await.products.values().cloned().collect();
        products.sort_by(|a, b| {
            let primary = compare_by(sort.field, a, b);
            let primary = match sort.order {
                SortOrder::Ascending => primary,
                SortOrder::Descending => primary.reverse(),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });
        Ok(products)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        self.enter(FailPoint::InsertProduct).await?;
        let mut tables = self.tables.write().await;
        tables.last_product_id += 1;
        let stored = Product {
            id: ProductId::new(tables.last_product_id),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            quantity_available: product.quantity_available,
        };
        tables.products.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        self.enter(FailPoint::UpdateProduct).await?;
        let mut tables = self.tables.write().await;
        Ok(tables.products.get_mut(&id).map(|product| {
            patch.apply_to(product);
            product.clone()
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        self.enter(FailPoint::DeleteProduct).await?;
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }

    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<StockReservation, RepositoryError> {
        self.enter(FailPoint::ReserveStock).await?;
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(StockReservation::Missing);
        };
        if product.quantity_available < quantity.as_i32() {
            return Ok(StockReservation::Insufficient {
                available: product.quantity_available,
            });
        }
        product.quantity_available -= quantity.as_i32();
        Ok(StockReservation::Reserved)
    }

    async fn release_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        self.enter(FailPoint::ReleaseStock).await?;
        if let Some(product) = self.tables.write().await.products.get_mut(&id) {
            product.quantity_available = product
                .quantity_available
                .saturating_add(quantity.as_i32());
        }
        Ok(())
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.enter(FailPoint::InsertOrder).await?;
        let mut tables = self.tables.write().await;
        tables.last_order_id += 1;
        let stored = order.clone().with_id(OrderId::new(tables.last_order_id));
        tables.orders.push(stored.clone());
        Ok(stored)
    }

    async fn list_orders(&self, username: &Username) -> Result<Vec<Order>, RepositoryError> {
        self.enter(FailPoint::ListOrders).await?;
        Ok(self
            .tables
            .read()
            .await
            .orders
            .iter()
            .filter(|o| &o.user_id == username)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use emporium_core::Price;

    use super::*;

    fn new_product(name: &str, description: &str, cents: i64, quantity: i32) -> NewProduct {
        NewProduct {
            name: name.to_owned(),
            description: description.to_owned(),
            price: Price::new(Decimal::new(cents, 2)).unwrap(),
            quantity_available: quantity,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for p in [
            new_product("Smartphone", "Latest model smartphone", 69_999, 100),
            new_product("Laptop", "High performance laptop", 129_999, 50),
            new_product("Tablet", "Lightweight tablet", 39_999, 200),
        ] {
            store.insert_product(&p).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_ids_are_assigned_in_order() {
        let store = seeded().await;
        let ids: Vec<i32> = store
            .list_products(&PriceRange::default())
            .await
            .unwrap()
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_search_matches_any_term_case_insensitively() {
        let store = seeded().await;
        let hits = store.search_products("TABLET laptop").await.unwrap();
        let names: Vec<&str> = hits.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Laptop", "Tablet"]);

        assert!(store.search_products("toaster").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sort_descending_by_price() {
        let store = seeded().await;
        let sorted = store
            .sort_products(ProductSort {
                field: SortField::Price,
                order: SortOrder::Descending,
            })
            .await
            .unwrap();
        let names: Vec<&str> = sorted.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Laptop", "Smartphone", "Tablet"]);
    }

    #[tokio::test]
    async fn test_reserve_stock_is_conditional() {
        let store = seeded().await;
        let laptop = ProductId::new(2);

        let outcome = store
            .reserve_stock(laptop, Quantity::new(51).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, StockReservation::Insufficient { available: 50 });

        let outcome = store
            .reserve_stock(laptop, Quantity::new(50).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, StockReservation::Reserved);
        assert_eq!(
            store.get_product(laptop).await.unwrap().unwrap().quantity_available,
            0
        );

        let outcome = store
            .reserve_stock(ProductId::new(99), Quantity::new(1).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, StockReservation::Missing);
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient_and_counted() {
        let store = seeded().await;
        store.fail_next(FailPoint::GetProduct, 1);

        let err = store.get_product(ProductId::new(1)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.get_product(ProductId::new(1)).await.unwrap().is_some());
        assert_eq!(store.call_count(FailPoint::GetProduct), 2);
    }

    #[tokio::test]
    async fn test_release_stock_saturates_at_column_max() {
        let store = MemoryStore::new();
        let product = store
            .insert_product(&new_product("Crate", "Bulk crate", 100, i32::MAX - 1))
            .await
            .unwrap();

        store
            .release_stock(product.id, Quantity::new(5).unwrap())
            .await
            .unwrap();

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity_available, i32::MAX);
    }

    #[tokio::test]
    async fn test_injected_delay_applies_once() {
        let store = seeded().await;
        store.delay_next(FailPoint::GetProduct, Duration::from_millis(200));

        let slow = tokio::time::timeout(
            Duration::from_millis(20),
            store.get_product(ProductId::new(1)),
        )
        .await;
        assert!(slow.is_err());

        let fast = tokio::time::timeout(
            Duration::from_millis(200),
            store.get_product(ProductId::new(1)),
        )
        .await;
        assert!(fast.unwrap().unwrap().is_some());
    }
}
