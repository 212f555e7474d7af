//! Login and token handling over HTTP.

use axum::http::{Method, StatusCode};
use emporium_core::{Role, Username};
use emporium_integration_tests::{TestApp, decimal, test_config};
use emporium_storefront::models::Identity;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;

#[tokio::test]
async fn test_login_returns_token_with_stored_role() {
    let app = TestApp::new();
    app.create_user("admin", "admin-pass", Role::Admin).await;

    let response = app
        .request(
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "admin", "password": "admin-pass"})),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let token = response.body["access_token"].as_str().unwrap();
    let identity = app.state.tokens().verify(token).unwrap();
    assert_eq!(identity.username.as_str(), "admin");
    assert_eq!(identity.role, Role::Admin);
}

#[tokio::test]
async fn test_wrong_password_is_rejected_without_token() {
    let app = TestApp::new();
    app.create_user("user1", "right-pass", Role::Customer).await;

    for body in [
        json!({"username": "user1", "password": "wrong-pass"}),
        json!({"username": "ghost", "password": "right-pass"}),
    ] {
        let response = app.request(Method::POST, "/login", None, Some(body)).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.message(), "Invalid credentials");
        assert!(response.body.get("access_token").is_none());
    }
}

#[tokio::test]
async fn test_malformed_login_body_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .request(Method::POST, "/login", None, Some(json!({"username": "admin"})))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(!response.message().is_empty());
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = TestApp::new();

    let response = app.request(Method::GET, "/orders", None, None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Missing Authorization header");
}

#[tokio::test]
async fn test_garbage_and_forged_tokens() {
    let app = TestApp::new();

    let response = app
        .request(Method::GET, "/orders", Some("not.a.token"), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Invalid token");

    // A token signed with another key must not be accepted.
    let mut config = test_config();
    config.auth.token_secret = SecretString::from("Zq8!mW3#rT6$yU1%iO4^pA7&sD0*fG2@");
    let other = TestApp::with_config(config);
    let forged = other.admin_token();

    let response = app
        .request(
            Method::POST,
            "/products",
            Some(&forged),
            Some(json!({"name": "Forged", "price": 1.0, "quantity_available": 1})),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(app.get("/products").await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_token() {
    let app = TestApp::new();
    let identity = Identity {
        username: Username::parse("user1").unwrap(),
        role: Role::Customer,
    };
    let issued_long_ago = unix_now() - 3600;
    let token = app
        .state
        .tokens()
        .issue_at(&identity, issued_long_ago)
        .unwrap();

    let response = app.request(Method::GET, "/orders", Some(&token), None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.message(), "Token has expired");
}

#[tokio::test]
async fn test_customer_cannot_mutate_catalog() {
    let app = TestApp::new();
    let product = app.create_product("Tablet", 39_999, 200).await;
    let token = app.customer_token();

    let created = app
        .request(
            Method::POST,
            "/products",
            Some(&token),
            Some(json!({"name": "Phone", "price": 10.0, "quantity_available": 1})),
        )
        .await;
    let updated = app
        .request(
            Method::PUT,
            &format!("/products/{}", product.id),
            Some(&token),
            Some(json!({"price": 1.0})),
        )
        .await;
    let deleted = app
        .request(
            Method::DELETE,
            &format!("/products/{}", product.id),
            Some(&token),
            None,
        )
        .await;

    for response in [created, updated, deleted] {
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.message(), "Admins only!");
    }
    let listing = app.get("/products").await.body;
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(decimal(&listing[0]["price"]), Decimal::new(39_999, 2));
}

/// Current Unix time in seconds.
fn unix_now() -> i64 {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap();
    i64::try_from(elapsed.as_secs()).unwrap()
}
