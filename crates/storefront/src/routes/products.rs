//! Product route handlers.
//!
//! Reads are public. Writes take [`RequireAdmin`], so a non-admin caller is
//! turned away before the handler runs.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{Price, ProductId};

use super::extract::{AppJson, AppQuery};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, PriceRange, Product, ProductPatch, ProductSort, SortField, SortOrder};
use crate::state::AppState;

/// Optional price bounds. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl PriceQuery {
    fn into_range(self) -> Result<PriceRange> {
        Ok(PriceRange {
            min: parse_price_bound("min_price", self.min_price.as_deref())?,
            max: parse_price_bound("max_price", self.max_price.as_deref())?,
        })
    }
}

fn parse_price_bound(name: &str, raw: Option<&str>) -> Result<Option<Price>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let amount = Decimal::from_str(raw)
        .map_err(|_| AppError::BadRequest(format!("{name} must be a number")))?;
    Price::new(amount)
        .map(Some)
        .map_err(|e| AppError::BadRequest(format!("{name}: {e}")))
}

/// Full-text search query.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// Sort parameters.
#[derive(Debug, Deserialize)]
pub struct SortQuery {
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

impl SortQuery {
    fn into_sort(self) -> Result<ProductSort> {
        let field = self
            .sort_field
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("sort_field is required".to_string()))?;
        let field = SortField::from_str(field).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let order = match self.sort_order.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(raw) => {
                SortOrder::from_str(raw).map_err(|e| AppError::BadRequest(e.to_string()))?
            }
        };
        Ok(ProductSort { field, order })
    }
}

/// Body returned after a product is created.
#[derive(Debug, Serialize)]
pub struct ProductCreated {
    pub message: &'static str,
    pub product_id: ProductId,
}

/// Body returned after an update or delete.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// List products, optionally within a price range.
///
/// GET /products, GET /products/filter
///
/// # Errors
///
/// Returns 400 for a malformed price bound.
pub async fn list(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PriceQuery>,
) -> Result<Response> {
    let range = query.into_range()?;
    let products = state.catalog().list_products(range).await?;
    Ok(Json(products.as_slice()).into_response())
}

/// Search products by name and description.
///
/// GET /products/search?query=
///
/// # Errors
///
/// Returns 400 if `query` is missing or blank.
pub async fn search(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> Result<Json<Vec<Product>>> {
    let query = query.query.unwrap_or_default();
    Ok(Json(state.catalog().search_products(&query).await?))
}

/// All products sorted by one field.
///
/// GET /products/sort?sort_field=&sort_order=
///
/// # Errors
///
/// Returns 400 for a missing or unknown field, or an order other than 1/-1.
pub async fn sort(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SortQuery>,
) -> Result<Json<Vec<Product>>> {
    let sort = query.into_sort()?;
    Ok(Json(state.catalog().sort_products(sort).await?))
}

/// Create a product.
///
/// POST /products
///
/// # Errors
///
/// Returns 401/403 for a missing token or non-admin caller and 400 for an
/// invalid body.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    AppJson(product): AppJson<NewProduct>,
) -> Result<(StatusCode, Json<ProductCreated>)> {
    let product = state.catalog().add_product(&identity, product).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProductCreated {
            message: "Product added successfully",
            product_id: product.id,
        }),
    ))
}

/// Apply a partial update to a product.
///
/// PUT /products/{id}
///
/// # Errors
///
/// Returns 404 if no product has `id`.
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Path(id): Path<String>,
    AppJson(patch): AppJson<ProductPatch>,
) -> Result<Json<MessageResponse>> {
    let id = parse_product_id(&id)?;
    state.catalog().update_product(&identity, id, patch).await?;
    Ok(Json(MessageResponse {
        message: "Product updated successfully",
    }))
}

/// Delete a product.
///
/// DELETE /products/{id}
///
/// # Errors
///
/// Returns 404 if no product has `id`.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(identity): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id = parse_product_id(&id)?;
    state.catalog().delete_product(&identity, id).await?;
    Ok(Json(MessageResponse {
        message: "Product deleted successfully",
    }))
}

/// An id that cannot name a product is reported like a missing one.
fn parse_product_id(raw: &str) -> Result<ProductId> {
    ProductId::from_str(raw).map_err(|_| AppError::NotFound("Product not found".to_string()))
}
