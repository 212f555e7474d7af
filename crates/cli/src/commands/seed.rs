//! Seed the database with users, products, and orders from a YAML file.
//!
//! # Usage
//!
//! ```bash
//! emporium seed --file crates/cli/seed/catalog.yaml
//! ```
//!
//! Seeding can be repeated: existing users are skipped, products are matched
//! by name, and orders are only created for users that have none.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use emporium_core::{Email, ProductId, Role, Username};
use emporium_storefront::db::{PgStore, RepositoryError, Store};
use emporium_storefront::models::{Identity, NewProduct, PriceRange, RequestedLine, User};
use emporium_storefront::services::{
    AuthError, OrderError, OrderService, hash_password, idempotency_cache,
};

use super::{ConnectError, connect};

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub products: Vec<NewProduct>,
    #[serde(default)]
    pub orders: Vec<SeedOrder>,
}

/// A user to create.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// An order to place on behalf of a seeded user.
#[derive(Debug, Deserialize)]
pub struct SeedOrder {
    pub user: String,
    pub products: Vec<SeedLine>,
}

/// An order line naming its product.
#[derive(Debug, Deserialize)]
pub struct SeedLine {
    pub product: String,
    pub quantity: i64,
}

/// What a seed run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users_created: usize,
    pub users_skipped: usize,
    pub products_created: usize,
    pub products_skipped: usize,
    pub orders_created: usize,
    pub orders_skipped: usize,
}

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid account in seed file: {0}")]
    Account(#[from] emporium_core::AccountError),

    #[error("Order references unknown user: {0}")]
    UnknownUser(String),

    #[error("Order references unknown product: {0}")]
    UnknownProduct(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Seed the database from a YAML file.
///
/// # Errors
///
/// Returns `SeedError` if the file cannot be read or parsed, the database is
/// unreachable, or an entry is invalid.
pub async fn run(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading seed data from file");

    // Parse before connecting so a bad file fails fast
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(connect().await?));
    let summary = apply(store, &seed).await?;

    info!("Seeding complete!");
    info!(
        "  Users: {} created, {} skipped",
        summary.users_created, summary.users_skipped
    );
    info!(
        "  Products: {} created, {} skipped",
        summary.products_created, summary.products_skipped
    );
    info!(
        "  Orders: {} created, {} skipped",
        summary.orders_created, summary.orders_skipped
    );
    Ok(())
}

/// Insert the contents of `seed` into `store`.
///
/// # Errors
///
/// Returns `SeedError` for invalid entries or store failures. Entries written
/// before the failure stay written.
pub async fn apply(store: Arc<dyn Store>, seed: &SeedFile) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    for entry in &seed.users {
        let user = User {
            username: Username::parse(&entry.username)?,
            email: Email::parse(&entry.email)?,
            role: entry.role,
        };
        if store.find_user(&user.username).await?.is_some() {
            summary.users_skipped += 1;
            continue;
        }
        // Seed passwords skip the length rule so the sample accounts can log
        // in with their usernames.
        let password_hash = hash_password(&entry.password)?;
        match store.insert_user(&user, &password_hash).await {
            Ok(()) => summary.users_created += 1,
            Err(RepositoryError::Conflict(_)) => summary.users_skipped += 1,
            Err(err) => return Err(err.into()),
        }
    }

    let mut product_ids: HashMap<String, ProductId> = store
        .list_products(&PriceRange::default())
        .await?
        .into_iter()
        .map(|product| (product.name, product.id))
        .collect();
    for product in &seed.products {
        if product_ids.contains_key(&product.name) {
            summary.products_skipped += 1;
            continue;
        }
        let created = store.insert_product(product).await?;
        product_ids.insert(created.name, created.id);
        summary.products_created += 1;
    }

    // Seed orders describe history, so stock is left as listed.
    let idempotency = idempotency_cache(Duration::from_secs(1), 1);
    let orders = OrderService::new(Arc::clone(&store), &idempotency, false);
    for entry in &seed.orders {
        let username = Username::parse(&entry.user)?;
        let record = store
            .find_user(&username)
            .await?
            .ok_or_else(|| SeedError::UnknownUser(entry.user.clone()))?;
        let identity = Identity::from(&record.user);

        if !store.list_orders(&identity.username).await?.is_empty() {
            summary.orders_skipped += 1;
            continue;
        }

        let lines = entry
            .products
            .iter()
            .map(|line| {
                product_ids
                    .get(&line.product)
                    .map(|id| RequestedLine::new(*id, line.quantity))
                    .ok_or_else(|| SeedError::UnknownProduct(line.product.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        orders.place_order(&identity, &lines, None).await?;
        summary.orders_created += 1;
    }

    Ok(summary)
}
