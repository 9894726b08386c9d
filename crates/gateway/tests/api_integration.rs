//! Integration tests for the gateway HTTP surface.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, UserId};
use domain::{DeclinePolicy, OrderLedger, OrderStatus, PaymentProcessor, UserDirectory};
use futures_util::future::join_all;
use gateway::AppState;
use gateway::config::GatewayConfig;
use gateway::state::{EmbeddedServices, remote_orchestrator};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup_with(config: GatewayConfig) -> (Router, EmbeddedServices) {
    let services = EmbeddedServices::start(&config).await;
    let state = AppState::new(services.orchestrator(&config));
    (gateway::create_app(state, get_metrics_handle()), services)
}

async fn setup() -> (Router, EmbeddedServices) {
    setup_with(GatewayConfig::default()).await
}

fn declining() -> GatewayConfig {
    GatewayConfig {
        decline_policy: DeclinePolicy::DeclineAll,
        ..GatewayConfig::default()
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn place_order(app: &Router, user_id: u64, products: &[&str]) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/order",
        Some(json!({ "userId": user_id, "products": products })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_get_user() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/user/1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({ "user": { "user_id": 1, "name": "Alice", "email": "alice@example.com" } })
    );
}

#[tokio::test]
async fn test_get_unknown_user_is_404() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/user/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("999"));
    assert_eq!(json["retryable"], false);
}

#[tokio::test]
async fn test_non_numeric_user_id_is_400() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/user/alice", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_update_user_email() {
    let (app, services) = setup().await;

    let (status, json) = send(
        &app,
        "PUT",
        "/user/2",
        Some(json!({ "email": "bob@new.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["email"], "bob@new.example");

    let (_, json) = send(&app, "GET", "/user/2", None).await;
    assert_eq!(json["user"]["email"], "bob@new.example");
    assert_eq!(
        services.users.get_user(UserId::new(2)).await.unwrap().email,
        "bob@new.example"
    );

    let (status, _) = send(&app, "PUT", "/user/2", Some(json!({ "email": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_order() {
    let (app, services) = setup().await;

    let (status, json) = place_order(&app, 1, &["sku-7"]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["message"],
        "Order placed and payment processed successfully"
    );
    let order_id = json["orderId"].as_str().unwrap().to_string();
    let transaction_id = json["transactionId"].as_str().unwrap().to_string();
    assert_eq!(order_id, "ORD-000001");
    assert_eq!(transaction_id, "TXN-000001");

    // The order view reflects the captured payment
    let (status, order) = send(&app, "GET", &format!("/order/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PaymentCaptured");
    assert_eq!(order["transactionId"], transaction_id);
    assert_eq!(order["userId"], 1);
    assert_eq!(order["products"], json!(["sku-7"]));

    // The saga view shows every forward step
    let (status, saga) = send(&app, "GET", &format!("/order/{order_id}/saga"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["state"], "Completed");
    assert_eq!(saga["amountCents"], 10050);
    assert_eq!(
        saga["completedSteps"],
        json!(["resolve_user", "place_order", "process_payment", "confirm_order"])
    );

    let tx = services
        .payments
        .get_transaction(&common::TransactionId::new(transaction_id))
        .await
        .unwrap();
    assert_eq!(tx.amount, Money::from_cents(10050));
}

#[tokio::test]
async fn test_place_order_for_unknown_user_creates_nothing() {
    let (app, services) = setup().await;

    let (status, json) = place_order(&app, 999, &["sku-7"]).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("orderId").is_none());
    assert_eq!(services.orders.order_count().await, 0);
    assert_eq!(services.payments.transaction_count().await, 0);
}

#[tokio::test]
async fn test_place_order_rejects_invalid_bodies() {
    let (app, services) = setup().await;

    let (status, _) = place_order(&app, 1, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, "POST", "/order", Some(json!({ "products": ["sku-7"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    assert_eq!(services.orders.order_count().await, 0);
}

#[tokio::test]
async fn test_declined_payment_is_402_and_order_fails() {
    let (app, _) = setup_with(declining()).await;

    let (status, json) = place_order(&app, 3, &["sku-7"]).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["retryable"], false);
    let order_id = json["orderId"].as_str().unwrap().to_string();

    let (_, order) = send(&app, "GET", &format!("/order/{order_id}"), None).await;
    assert_eq!(order["status"], "Failed");
    assert!(order["failureReason"].is_string());

    let (_, saga) = send(&app, "GET", &format!("/order/{order_id}/saga"), None).await;
    assert_eq!(saga["state"], "Compensated");

    // A failed order can be closed
    let (status, order) = send(&app, "POST", &format!("/order/{order_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Cancelled");
}

#[tokio::test]
async fn test_cancel_captured_order_is_conflict() {
    let (app, _) = setup().await;
    let (_, json) = place_order(&app, 1, &["sku-7"]).await;
    let order_id = json["orderId"].as_str().unwrap();

    let (status, json) = send(&app, "POST", &format!("/order/{order_id}/cancel"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unknown_order_is_404() {
    let (app, _) = setup().await;

    let (status, _) = send(&app, "GET", "/order/ORD-999999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/order/ORD-999999/saga", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup().await;
    place_order(&app, 1, &["sku-7"]).await;

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
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_executions_total"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_are_isolated() {
    let (app, services) = setup().await;

    let requests = (0..30u64).map(|i| {
        let app = app.clone();
        async move { place_order(&app, 1 + i % 3, &["sku-7"]).await }
    });
    let responses = join_all(requests).await;

    let mut order_ids = HashSet::new();
    for (status, json) in responses {
        assert_eq!(status, StatusCode::OK);
        order_ids.insert(json["orderId"].as_str().unwrap().to_string());
    }
    assert_eq!(order_ids.len(), 30);
    assert_eq!(
        services
            .orders
            .count_with_status(OrderStatus::PaymentCaptured)
            .await,
        30
    );
}

// -- Remote leaf services --

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_gateway_over_rpc() {
    let ledger = OrderLedger::new();
    let config = GatewayConfig {
        user_service_addr: spawn(rpc::user_router(Arc::new(
            UserDirectory::with_demo_users().await,
        )))
        .await,
        order_service_addr: spawn(rpc::order_router(Arc::new(ledger.clone()))).await,
        payment_service_addr: spawn(rpc::payment_router(Arc::new(PaymentProcessor::new())))
            .await,
        ..GatewayConfig::default()
    };
    let state = AppState::new(remote_orchestrator(&config).unwrap());
    let app = gateway::create_app(state, get_metrics_handle());

    let (status, json) = send(&app, "GET", "/user/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["name"], "Bob");

    let (status, json) = place_order(&app, 2, &["sku-7"]).await;
    assert_eq!(status, StatusCode::OK);
    let order_id = common::OrderId::new(json["orderId"].as_str().unwrap());
    assert_eq!(
        ledger.get_order(&order_id).await.unwrap().status,
        OrderStatus::PaymentCaptured
    );
}

#[tokio::test]
async fn test_payment_service_down_is_503_and_order_fails() {
    let ledger = OrderLedger::new();
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let config = GatewayConfig {
        user_service_addr: spawn(rpc::user_router(Arc::new(
            UserDirectory::with_demo_users().await,
        )))
        .await,
        order_service_addr: spawn(rpc::order_router(Arc::new(ledger.clone()))).await,
        payment_service_addr: dead,
        call_timeout: Duration::from_millis(500),
        ..GatewayConfig::default()
    };
    let state = AppState::new(remote_orchestrator(&config).unwrap());
    let app = gateway::create_app(state, get_metrics_handle());

    let (status, json) = place_order(&app, 1, &["sku-7"]).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["retryable"], true);
    let order_id = common::OrderId::new(json["orderId"].as_str().unwrap());
    assert_eq!(
        ledger.get_order(&order_id).await.unwrap().status,
        OrderStatus::Failed
    );
}
