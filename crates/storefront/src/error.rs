//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`. Every error body is `{"message": "..."}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AuthError, CatalogError, OrderError};

/// Message returned for every server-side failure.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or authorization failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request did not finish in time.
    #[error("Request timed out")]
    Timeout,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message, safe to show to clients.
    pub message: String,
}

impl AppError {
    /// HTTP status and client-facing message.
    ///
    /// Internal details never appear in the message for 5xx statuses.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(_) | Self::Internal(_) => server_error(),
            Self::Auth(err) => auth_status(err),
            Self::Catalog(err) => match err {
                CatalogError::Auth(err) => auth_status(err),
                CatalogError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CatalogError::NotFound => {
                    (StatusCode::NOT_FOUND, "Product not found".to_string())
                }
                CatalogError::Repository(_) => server_error(),
            },
            Self::Order(err) => match err {
                OrderError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                OrderError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
                OrderError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                OrderError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
                OrderError::Repository(_) => server_error(),
            },
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Timeout => (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string()),
        }
    }
}

fn server_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        GENERIC_ERROR_MESSAGE.to_string(),
    )
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::MissingToken => (
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".to_string(),
        ),
        AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
        AuthError::ExpiredToken => (StatusCode::UNAUTHORIZED, "Token has expired".to_string()),
        AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, "Admins only!".to_string()),
        AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists".to_string()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::Account(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Signing => server_error(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(ErrorBody { message })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated caller.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(username: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::{ProductId, Role};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_message(err: AppError) -> String {
        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_auth_status_codes() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::MissingToken,
            AuthError::InvalidToken,
            AuthError::ExpiredToken,
        ] {
            assert_eq!(get_status(err.into()), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            get_status(
                AuthError::Forbidden {
                    required: Role::Admin
                }
                .into()
            ),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(CatalogError::Auth(AuthError::Forbidden { required: Role::Admin }).into()),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_domain_status_codes() {
        assert_eq!(
            get_status(CatalogError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CatalogError::Validation("bad".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderError::ProductNotFound("X9".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                OrderError::InvalidQuantity {
                    product_id: "1".to_string(),
                    quantity: 0
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                OrderError::InsufficientStock {
                    product_id: ProductId::new(1),
                    requested: 5,
                    available: 2
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(AppError::Timeout), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "orders.line_items is not an array".to_string(),
        ));
        assert_eq!(get_message(err).await, GENERIC_ERROR_MESSAGE);

        let err = OrderError::Repository(RepositoryError::Unavailable("pool closed".to_string()));
        assert_eq!(get_message(err.into()).await, GENERIC_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_client_messages() {
        assert_eq!(
            get_message(AuthError::InvalidCredentials.into()).await,
            "Invalid credentials"
        );
        assert_eq!(
            get_message(AuthError::Forbidden { required: Role::Admin }.into()).await,
            "Admins only!"
        );
        assert_eq!(
            get_message(CatalogError::NotFound.into()).await,
            "Product not found"
        );
        assert_eq!(
            get_message(OrderError::ProductNotFound("X9".to_string()).into()).await,
            "product X9 not found"
        );
    }
}
