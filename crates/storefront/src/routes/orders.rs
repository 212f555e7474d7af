//! Order route handlers.
//!
//! Both routes take [`RequireAuth`]. The order owner is always the token's
//! username; a `user_id` in the request body is accepted for compatibility
//! and otherwise ignored.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use emporium_core::OrderId;

use super::extract::AppJson;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, RequestedLine};
use crate::state::AppState;

/// Header carrying a client-chosen key for safe retries.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Order placement request body.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// Ignored: the owner comes from the token.
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    pub products: Vec<RequestedLine>,
}

/// Body returned after an order is placed.
#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub message: &'static str,
    pub order_id: OrderId,
}

/// The caller's orders.
///
/// GET /orders
///
/// # Errors
///
/// Returns 401 without a valid token.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_orders(&identity).await?))
}

/// Place an order for the caller.
///
/// POST /orders
///
/// # Errors
///
/// Returns 400 for an invalid body or quantity, 404 for an unknown product,
/// and 409 when stock runs short.
pub async fn place(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    headers: HeaderMap,
    AppJson(request): AppJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlaced>)> {
    let idempotency_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => Some(value.to_str().map_err(|_| {
            AppError::BadRequest("Idempotency-Key must be printable ASCII".to_string())
        })?),
        None => None,
    };

    let claimed = request.user_id.as_ref().and_then(serde_json::Value::as_str);
    if claimed.is_some_and(|claimed| claimed != identity.username.as_str()) {
        tracing::debug!(claimed, "Ignoring user_id that differs from the token");
    }

    let order = state
        .orders()
        .place_order(&identity, &request.products, idempotency_key)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlaced {
            message: "Order placed successfully",
            order_id: order.id,
        }),
    ))
}
