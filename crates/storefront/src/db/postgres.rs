//! `PostgreSQL` implementation of [`Store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use emporium_core::{Email, OrderId, Price, ProductId, Quantity, Role, Username};

use super::{RepositoryError, StockReservation, Store};
use crate::models::{
    LineItem, NewOrder, NewProduct, Order, PriceRange, Product, ProductPatch, ProductSort, User,
    UserRecord,
};

const PRODUCT_COLUMNS: &str = "id, name, description, price, quantity_available";

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    email: String,
    role: Role,
    password_hash: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            user: User {
                username,
                email,
                role: row.role,
            },
            password_hash: row.password_hash,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    quantity_available: i32,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price,
            quantity_available: row.quantity_available,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: String,
    line_items: Json<Vec<LineItem>>,
    total_price: Decimal,
    order_date: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let user_id = Username::parse(&row.user_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid user_id on order {}: {e}", row.id))
        })?;
        let total_price = Price::new(row.total_price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid total on order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id,
            line_items: row.line_items.0,
            total_price,
            order_date: row.order_date,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Rewrite whitespace-separated terms as a `websearch_to_tsquery` disjunction.
fn any_term_query(terms: &str) -> String {
    terms.split_whitespace().collect::<Vec<_>>().join(" or ")
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(username = %username))]
    async fn find_user(&self, username: &Username) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT username, email, role, password_hash
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    #[instrument(skip_all, fields(username = %user.username))]
    async fn insert_user(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO users (username, password_hash, email, role)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user.username.as_str())
        .bind(password_hash)
        .bind(user.email.as_str())
        .bind(user.role)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("username already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_products(&self, range: &PriceRange) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::numeric IS NULL OR price >= $1)
              AND ($2::numeric IS NULL OR price <= $2)
            ORDER BY id
            "
        ))
        .bind(range.min)
        .bind(range.max)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    #[instrument(skip(self))]
    async fn search_products(&self, terms: &str) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE search_vector @@ websearch_to_tsquery('english', $1)
            ORDER BY id
            "
        ))
        .bind(any_term_query(terms))
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    #[instrument(skip(self))]
    async fn sort_products(&self, sort: ProductSort) -> Result<Vec<Product>, RepositoryError> {
        // Column and direction come from closed enums, never from request text.
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY {} {}, id ASC",
            sort.field.column(),
            sort.order.sql(),
        ))
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }

    #[instrument(skip_all, fields(name = %product.name))]
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (name, description, price, quantity_available)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity_available)
        .fetch_one(&self.pool)
        .await?;

        Product::try_from(row)
    }

    #[instrument(skip(self, patch))]
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                quantity_available = COALESCE($5, quantity_available)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.price)
        .bind(patch.quantity_available)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn reserve_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<StockReservation, RepositoryError> {
        let taken: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE products
            SET quantity_available = quantity_available - $2
            WHERE id = $1 AND quantity_available >= $2
            RETURNING quantity_available
            ",
        )
        .bind(id)
        .bind(quantity.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        if taken.is_some() {
            return Ok(StockReservation::Reserved);
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT quantity_available FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(available.map_or(StockReservation::Missing, |available| {
            StockReservation::Insufficient { available }
        }))
    }

    #[instrument(skip(self))]
    async fn release_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        // Saturates at the column maximum instead of failing the release.
        sqlx::query(
            r"
            UPDATE products
            SET quantity_available = LEAST(quantity_available::bigint + $2, 2147483647)::int
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(quantity.as_i32())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %order.user_id))]
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO orders (user_id, line_items, total_price, order_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(order.user_id.as_str())
        .bind(Json(&order.line_items))
        .bind(order.total_price)
        .bind(order.order_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict(format!("unknown user {}", order.user_id));
            }
            RepositoryError::Database(e)
        })?;

        Ok(order.clone().with_id(OrderId::new(id)))
    }

    #[instrument(skip_all, fields(username = %username))]
    async fn list_orders(&self, username: &Username) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, line_items, total_price, order_date
            FROM orders
            WHERE user_id = $1
            ORDER BY order_date, id
            ",
        )
        .bind(username.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_term_query() {
        assert_eq!(any_term_query("tablet  laptop"), "tablet or laptop");
        assert_eq!(any_term_query(" phone "), "phone");
    }
}
