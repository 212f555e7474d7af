//! Request timeout.
//!
//! `tower-http`'s `TimeoutLayer` answers slow requests with an empty 408.
//! [`timeout_body`] runs outside it and gives that response the same JSON
//! shape as every other error.

use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, response::Response};
use tower_http::timeout::TimeoutLayer;

use crate::error::AppError;

/// Layer that aborts requests running longer than `timeout`.
#[must_use]
pub fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Replace the body of a timed-out response with `{"message": ...}`.
pub async fn timeout_body(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        tracing::warn!("Request timed out");
        return AppError::Timeout.into_response();
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::Request, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_slow_handler_gets_json_408() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(timeout_layer(Duration::from_millis(20)))
            .layer(middleware::map_response(timeout_body));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Request timed out");
    }
}
