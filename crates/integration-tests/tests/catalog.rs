//! Product routes and listing cache coherence.

use axum::http::{Method, StatusCode};
use emporium_integration_tests::{TestApp, decimal};
use emporium_storefront::db::FailPoint;
use rust_decimal::Decimal;
use serde_json::{Value, json};

fn names(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect()
}

async fn seeded() -> TestApp {
    let app = TestApp::new();
    app.create_product("Smartphone", 69_999, 100).await;
    app.create_product("Laptop", 129_999, 50).await;
    app.create_product("Tablet", 39_999, 200).await;
    app
}

#[tokio::test]
async fn test_list_and_filter_by_price() {
    let app = seeded().await;

    let all = app.get("/products").await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(names(&all.body), ["Smartphone", "Laptop", "Tablet"]);
    assert_eq!(all.body[2]["id"], json!(3));
    assert_eq!(all.body[2]["quantity_available"], json!(200));

    let mid = app.get("/products/filter?min_price=400&max_price=1000").await;
    assert_eq!(names(&mid.body), ["Smartphone"]);

    let cheap = app.get("/products?max_price=399.99&min_price=").await;
    assert_eq!(names(&cheap.body), ["Tablet"]);

    let bad = app.get("/products/filter?min_price=cheap").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search() {
    let app = seeded().await;

    let found = app.get("/products/search?query=LAPTOP%20tablet").await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(names(&found.body), ["Laptop", "Tablet"]);

    for uri in ["/products/search", "/products/search?query=", "/products/search?query=%20"] {
        let response = app.get(uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_sort() {
    let app = seeded().await;

    let by_price = app.get("/products/sort?sort_field=price").await;
    assert_eq!(names(&by_price.body), ["Tablet", "Smartphone", "Laptop"]);

    let by_name_desc = app.get("/products/sort?sort_field=name&sort_order=-1").await;
    assert_eq!(names(&by_name_desc.body), ["Tablet", "Smartphone", "Laptop"]);

    for uri in [
        "/products/sort",
        "/products/sort?sort_field=password_hash",
        "/products/sort?sort_field=price&sort_order=2",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(!response.message().is_empty());
    }
}

#[tokio::test]
async fn test_admin_crud() {
    let app = TestApp::new();
    let token = app.admin_token();

    let created = app
        .request(
            Method::POST,
            "/products",
            Some(&token),
            Some(json!({
                "name": "Tablet",
                "description": "A versatile tablet",
                "price": 399.99,
                "quantity_available": 200
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.message(), "Product added successfully");
    let id = created.body["product_id"].as_i64().unwrap();

    let updated = app
        .request(
            Method::PUT,
            &format!("/products/{id}"),
            Some(&token),
            Some(json!({"price": 349.99, "unknown_field": true})),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.message(), "Product updated successfully");

    let listing = app.get("/products").await.body;
    assert_eq!(decimal(&listing[0]["price"]), Decimal::new(34_999, 2));
    assert_eq!(listing[0]["description"], "A versatile tablet");

    let deleted = app
        .request(Method::DELETE, &format!("/products/{id}"), Some(&token), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.message(), "Product deleted successfully");
    assert!(app.get("/products").await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_products_are_not_found() {
    let app = TestApp::new();
    let token = app.admin_token();

    for uri in ["/products/42", "/products/not-a-number"] {
        let updated = app
            .request(Method::PUT, uri, Some(&token), Some(json!({"price": 1.0})))
            .await;
        assert_eq!(updated.status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(updated.message(), "Product not found");

        let deleted = app.request(Method::DELETE, uri, Some(&token), None).await;
        assert_eq!(deleted.status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_invalid_product_bodies() {
    let app = TestApp::new();
    let token = app.admin_token();

    for body in [
        json!({"name": "", "price": 1.0, "quantity_available": 1}),
        json!({"name": "Widget", "price": -1.0, "quantity_available": 1}),
        json!({"name": "Widget", "price": 1.0, "quantity_available": -5}),
        json!({"name": "Widget", "quantity_available": 1}),
        json!({"name": "Widget", "price": "cheap", "quantity_available": 1}),
    ] {
        let response = app
            .request(Method::POST, "/products", Some(&token), Some(body.clone()))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{body}");
    }
    assert_eq!(app.store.call_count(FailPoint::InsertProduct), 0);
}

#[tokio::test]
async fn test_listing_is_served_from_cache() {
    let app = seeded().await;

    app.get("/products").await;
    app.get("/products").await;
    app.get("/products/filter").await;

    assert_eq!(app.store.call_count(FailPoint::ListProducts), 1);
}

#[tokio::test]
async fn test_update_is_visible_on_next_listing() {
    let app = seeded().await;
    let token = app.admin_token();

    let before = app.get("/products").await.body;
    assert_eq!(decimal(&before[0]["price"]), Decimal::new(69_999, 2));

    let response = app
        .request(
            Method::PUT,
            "/products/1",
            Some(&token),
            Some(json!({"price": 599.99})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let after = app.get("/products").await.body;
    assert_eq!(decimal(&after[0]["price"]), Decimal::new(59_999, 2));
}

#[tokio::test]
async fn test_concurrent_mutations_leave_no_stale_listing() {
    let app = seeded().await;
    let token = app.admin_token();

    // Warm the cache, then race writes against reads.
    app.get("/products").await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let writer = app.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            writer
                .request(
                    Method::POST,
                    "/products",
                    Some(&token),
                    Some(json!({
                        "name": format!("Gadget {i}"),
                        "price": 9.99,
                        "quantity_available": 1
                    })),
                )
                .await
                .status
        }));
        let reader = app.clone();
        handles.push(tokio::spawn(async move { reader.get("/products").await.status }));
    }
    for handle in handles {
        let status = handle.await.unwrap();
        assert!(status == StatusCode::CREATED || status == StatusCode::OK);
    }

    let listing = app.get("/products").await.body;
    assert_eq!(listing.as_array().unwrap().len(), 13);
}
