//! Catalog service: product queries and admin-only mutations.
//!
//! Every successful mutation clears the response cache before returning.
//! Role checks run before the store is touched.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use emporium_core::{Price, ProductId, Role};

use super::auth::{AuthError, require_role};
use crate::cache::CatalogCache;
use crate::db::{RepositoryError, Store};
use crate::models::{Identity, NewProduct, PriceRange, Product, ProductPatch, ProductSort};

/// Largest unit price the `products.price` column can hold.
const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Caller is not allowed to mutate the catalog.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No product with the given id.
    #[error("product not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Product catalog operations.
pub struct CatalogService<'a> {
    store: &'a dyn Store,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    /// Create a catalog service over `store`, caching listings in `cache`.
    #[must_use]
    pub const fn new(store: &'a dyn Store, cache: &'a CatalogCache) -> Self {
        Self { store, cache }
    }

    /// Products in a price range, read through the response cache.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails on a cache miss.
    pub async fn list_products(
        &self,
        range: PriceRange,
    ) -> Result<Arc<Vec<Product>>, CatalogError> {
        let products = self
            .cache
            .get_or_compute(range, move || async move {
                self.store.list_products(&range).await.map(Arc::new)
            })
            .await?;
        Ok(products)
    }

    /// Products matching any of the words in `query`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a blank query.
    #[instrument(skip(self))]
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, CatalogError> {
        if query.trim().is_empty() {
            return Err(CatalogError::Validation(
                "search query cannot be empty".to_owned(),
            ));
        }
        Ok(self.store.search_products(query).await?)
    }

    /// Every product, sorted.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn sort_products(&self, sort: ProductSort) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.sort_products(sort).await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Auth` unless the caller is an admin, and
    /// `CatalogError::Validation` for an empty name, negative stock, or an
    /// out-of-range price.
    #[instrument(skip_all, fields(username = %identity.username))]
    pub async fn add_product(
        &self,
        identity: &Identity,
        product: NewProduct,
    ) -> Result<Product, CatalogError> {
        require_role(identity, Role::Admin)?;
        validate_name(&product.name)?;
        validate_price(product.price)?;
        validate_quantity(product.quantity_available)?;

        let product = self.store.insert_product(&product).await?;
        self.cache.invalidate_all().await;

        tracing::info!(product_id = %product.id, "Product added");
        Ok(product)
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Auth` unless the caller is an admin,
    /// `CatalogError::Validation` for an empty or invalid patch, and
    /// `CatalogError::NotFound` if no product has `id`.
    #[instrument(skip_all, fields(username = %identity.username, product_id = %id))]
    pub async fn update_product(
        &self,
        identity: &Identity,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, CatalogError> {
        require_role(identity, Role::Admin)?;
        if patch.is_empty() {
            return Err(CatalogError::Validation(
                "update must set at least one of name, description, price, quantity_available"
                    .to_owned(),
            ));
        }
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        if let Some(quantity) = patch.quantity_available {
            validate_quantity(quantity)?;
        }

        let product = self
            .store
            .update_product(id, &patch)
            .await?
            .ok_or(CatalogError::NotFound)?;
        self.cache.invalidate_all().await;

        tracing::info!("Product updated");
        Ok(product)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Auth` unless the caller is an admin and
    /// `CatalogError::NotFound` if no product has `id`.
    #[instrument(skip_all, fields(username = %identity.username, product_id = %id))]
    pub async fn delete_product(
        &self,
        identity: &Identity,
        id: ProductId,
    ) -> Result<(), CatalogError> {
        require_role(identity, Role::Admin)?;

        if !self.store.delete_product(id).await? {
            return Err(CatalogError::NotFound);
        }
        self.cache.invalidate_all().await;

        tracing::info!("Product deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Validation("name cannot be empty".to_owned()));
    }
    Ok(())
}

fn validate_price(price: Price) -> Result<(), CatalogError> {
    if price.amount() > MAX_UNIT_PRICE {
        return Err(CatalogError::Validation(format!(
            "price must be at most {MAX_UNIT_PRICE}"
        )));
    }
    Ok(())
}

fn validate_quantity(quantity: i32) -> Result<(), CatalogError> {
    if quantity < 0 {
        return Err(CatalogError::Validation(
            "quantity_available cannot be negative".to_owned(),
        ));
    }
    Ok(())
}
