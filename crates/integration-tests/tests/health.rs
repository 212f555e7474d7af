//! Health checks and request IDs.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use emporium_integration_tests::TestApp;
use emporium_storefront::db::FailPoint;
use emporium_storefront::middleware::REQUEST_ID_HEADER;

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_follows_store() {
    let app = TestApp::new();

    assert_eq!(app.get("/health/ready").await.status, StatusCode::OK);

    app.store.fail_next(FailPoint::Ping, 1);
    assert_eq!(
        app.get("/health/ready").await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );

    assert_eq!(app.get("/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "lb-5521")
        .body(Body::empty())
        .unwrap();
    let echoed = app.send(request).await;
    assert_eq!(echoed.headers[REQUEST_ID_HEADER], "lb-5521");

    let generated = app.get("/products").await;
    let id = generated.headers[REQUEST_ID_HEADER].to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_error_responses_carry_request_id() {
    let app = TestApp::new();

    let response = app.get("/orders").await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.headers.contains_key(REQUEST_ID_HEADER));
}
