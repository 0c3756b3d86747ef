//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use api::AppState;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use storage::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = Arc::new(AppState::new(store.clone()));
    (api::create_app(state, get_metrics_handle()), store)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
}

async fn post_without_body(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn create_customer(app: &axum::Router) -> String {
    let (status, customer) = post(
        app,
        "/customers",
        json!({
            "name": "Ada Lovelace",
            "email": "ada@example.test",
            "phone": "555-0101",
            "address": "12 Analytical Row"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    customer["id"].as_str().unwrap().to_string()
}

async fn create_supplier(app: &axum::Router) -> String {
    let (status, supplier) = post(
        app,
        "/suppliers",
        json!({
            "name": "Acme Parts",
            "contact_name": "Jo Smith",
            "phone": "555-0100",
            "email": "jo@acme.test",
            "address": "1 Main St",
            "tax_id": "12.345.678/0001-90"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    supplier["id"].as_str().unwrap().to_string()
}

async fn create_product(app: &axum::Router, supplier_id: &str, price: i64, stock: u32) -> String {
    let (status, product) = post(
        app,
        "/products",
        json!({
            "supplier_id": supplier_id,
            "name": "Widget",
            "description": null,
            "price": price,
            "initial_stock": stock,
            "min_stock": 2,
            "active": true
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    product["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_register_and_get_product() {
    let (app, _) = setup();
    let supplier_id = create_supplier(&app).await;
    let product_id = create_product(&app, &supplier_id, 1000, 10).await;

    let (status, product) = get(&app, &format!("/products/{product_id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["supplier_id"], supplier_id);
    assert_eq!(product["price"], 1000);
    assert_eq!(product["stock"], 10);
    assert_eq!(product["low_on_stock"], false);
}

#[tokio::test]
async fn test_product_for_unknown_supplier_is_bad_request() {
    let (app, _) = setup();
    let missing = uuid::Uuid::new_v4().to_string();

    let (status, json) = post(
        &app,
        "/products",
        json!({
            "supplier_id": missing,
            "name": "Orphan",
            "description": null,
            "price": 100,
            "initial_stock": 1,
            "min_stock": 0,
            "active": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("supplier"));
}

#[tokio::test]
async fn test_place_and_get_order() {
    let (app, _) = setup();
    let customer_id = create_customer(&app).await;
    let supplier_id = create_supplier(&app).await;
    let product_id = create_product(&app, &supplier_id, 1000, 10).await;

    let (status, placed) = post(
        &app,
        "/orders",
        json!({
            "customer_id": customer_id,
            "lines": [{ "product_id": product_id, "quantity": 3 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(placed["status"], "Created");
    assert_eq!(placed["total_cents"], 3000);
    assert_eq!(placed["audit"]["status"], "recorded");
    let order_id = placed["order_id"].as_str().unwrap();

    let (status, order) = get(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["customer_id"], customer_id);
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);
    assert_eq!(order["lines"][0]["unit_price_cents"], 1000);
    assert_eq!(order["lines"][0]["line_total_cents"], 3000);

    let (_, product) = get(&app, &format!("/products/{product_id}")).await;
    assert_eq!(product["stock"], 7);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict_with_line_detail() {
    let (app, _) = setup();
    let customer_id = create_customer(&app).await;
    let supplier_id = create_supplier(&app).await;
    let product_id = create_product(&app, &supplier_id, 1000, 2).await;

    let (status, json) = post(
        &app,
        "/orders",
        json!({
            "customer_id": customer_id,
            "lines": [{ "product_id": product_id, "quantity": 5 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "rejected");
    let line = &json["lines"][0];
    assert_eq!(line["product_id"], product_id);
    assert_eq!(line["reason"], "insufficient_stock");
    assert_eq!(line["available"], 2);
    assert_eq!(line["requested"], 5);

    let (_, product) = get(&app, &format!("/products/{product_id}")).await;
    assert_eq!(product["stock"], 2);
}

#[tokio::test]
async fn test_empty_order_is_bad_request() {
    let (app, _) = setup();
    let customer_id = create_customer(&app).await;

    let (status, _) = post(
        &app,
        "/orders",
        json!({ "customer_id": customer_id, "lines": [] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_commit_failure_is_service_unavailable() {
    let (app, store) = setup();
    let customer_id = create_customer(&app).await;
    let supplier_id = create_supplier(&app).await;
    let product_id = create_product(&app, &supplier_id, 1000, 4).await;
    store.set_fail_on_save_order(true);

    let (status, json) = post(
        &app,
        "/orders",
        json!({
            "customer_id": customer_id,
            "lines": [{ "product_id": product_id, "quantity": 4 }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["retryable"], true);

    let (_, product) = get(&app, &format!("/products/{product_id}")).await;
    assert_eq!(product["stock"], 4);
}

#[tokio::test]
async fn test_confirm_cancel_and_history() {
    let (app, _) = setup();
    let customer_id = create_customer(&app).await;
    let supplier_id = create_supplier(&app).await;
    let product_id = create_product(&app, &supplier_id, 250, 6).await;

    let (_, placed) = post(
        &app,
        "/orders",
        json!({
            "customer_id": customer_id,
            "lines": [{ "product_id": product_id, "quantity": 6 }]
        }),
    )
    .await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, confirmed) = post_without_body(&app, &format!("/orders/{order_id}/confirm")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "Confirmed");

    let (status, cancelled) = post(
        &app,
        &format!("/orders/{order_id}/cancel"),
        json!({ "reason": "customer changed their mind" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "Cancelled");

    let (_, product) = get(&app, &format!("/products/{product_id}")).await;
    assert_eq!(product["stock"], 6);

    let (status, _) = post(&app, &format!("/orders/{order_id}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, history) = get(&app, &format!("/orders/{order_id}/history")).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        ["Order Created", "Order Confirmed", "Order Cancelled"]
    );
}

#[tokio::test]
async fn test_cancel_accepts_missing_body() {
    let (app, _) = setup();
    let customer_id = create_customer(&app).await;
    let supplier_id = create_supplier(&app).await;
    let product_id = create_product(&app, &supplier_id, 400, 3).await;

    let (_, placed) = post(
        &app,
        "/orders",
        json!({
            "customer_id": customer_id,
            "lines": [{ "product_id": product_id, "quantity": 2 }]
        }),
    )
    .await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, cancelled) = post_without_body(&app, &format!("/orders/{order_id}/cancel")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "Cancelled");
    let (_, product) = get(&app, &format!("/products/{product_id}")).await;
    assert_eq!(product["stock"], 3);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = get(&app, &format!("/orders/{fake_id}")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let (app, _) = setup();

    let (status, json) = get(&app, "/orders/not-a-uuid").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("order"));
}
