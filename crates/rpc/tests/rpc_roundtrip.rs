//! End-to-end tests over real loopback sockets.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::{Money, OrderId, ProductId, TransactionId, UserId};
use domain::{DeclinePolicy, OrderLedger, OrderStatus, PaymentProcessor, UserDirectory};
use rpc::protocol::{PAYMENT_SERVICE, USER_SERVICE, method_path, methods};
use rpc::{
    OrderServiceClient, PaymentServiceClient, UserServiceClient, order_router, payment_router,
    user_router,
};
use saga::{
    Fault, FaultInjector, OrderOrchestrator, OrderService, PaymentService, SagaError, SagaState,
    ServiceError, UserService,
};
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Serves `router` on an ephemeral port and returns its base URL.
async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Returns an address nothing is listening on.
async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn sku7() -> Vec<ProductId> {
    vec![ProductId::new("sku-7")]
}

struct Cluster {
    users: UserDirectory,
    ledger: OrderLedger,
    payments: PaymentProcessor,
    user_addr: String,
    payment_addr: String,
    user_client: UserServiceClient,
    order_client: OrderServiceClient,
    payment_client: PaymentServiceClient,
}

impl Cluster {
    async fn start(policy: DeclinePolicy) -> Self {
        let users = UserDirectory::with_demo_users().await;
        let ledger = OrderLedger::new();
        let payments = PaymentProcessor::new().with_policy(policy);

        let user_addr = spawn(user_router(Arc::new(users.clone()))).await;
        let order_addr = spawn(order_router(Arc::new(ledger.clone()))).await;
        let payment_addr = spawn(payment_router(Arc::new(payments.clone()))).await;

        Self {
            user_client: UserServiceClient::connect(&user_addr, TIMEOUT).unwrap(),
            order_client: OrderServiceClient::connect(&order_addr, TIMEOUT).unwrap(),
            payment_client: PaymentServiceClient::connect(&payment_addr, TIMEOUT).unwrap(),
            users,
            ledger,
            payments,
            user_addr,
            payment_addr,
        }
    }

    fn orchestrator(&self) -> OrderOrchestrator {
        OrderOrchestrator::new(
            Arc::new(self.user_client.clone()),
            Arc::new(self.order_client.clone()),
            Arc::new(self.payment_client.clone()),
        )
    }
}

#[tokio::test]
async fn test_get_user_over_the_wire() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;

    let alice = cluster.user_client.get_user(UserId::new(1)).await.unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.email, "alice@example.com");

    let err = cluster
        .user_client
        .get_user(UserId::new(999))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_update_user_over_the_wire() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;

    let bob = cluster
        .user_client
        .update_user(UserId::new(2), "bob@new.example".to_string())
        .await
        .unwrap();
    assert_eq!(bob.email, "bob@new.example");
    assert_eq!(
        cluster.users.get_user(UserId::new(2)).await.unwrap().email,
        "bob@new.example"
    );

    let err = cluster
        .user_client
        .update_user(UserId::new(2), "  ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn test_raw_request_uses_exact_field_names() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!(
            "{}{}",
            cluster.user_addr,
            method_path(USER_SERVICE, methods::GET_USER)
        ))
        .json(&serde_json::json!({"user_id": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({"user_id": 3, "name": "Charlie", "email": "charlie@example.com"})
    );

    let response = http
        .post(format!(
            "{}{}",
            cluster.payment_addr,
            method_path(PAYMENT_SERVICE, methods::PROCESS_PAYMENT)
        ))
        .json(&serde_json::json!({"order_id": "ORD-000042", "amount": -5.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_order_lifecycle_over_the_wire() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let orders = &cluster.order_client;

    let order_id = orders.place_order(UserId::new(1), sku7()).await.unwrap();
    assert_eq!(order_id.as_str(), "ORD-000001");

    let pending = orders.get_order(&order_id).await.unwrap();
    assert_eq!(pending.status, OrderStatus::Pending);
    assert_eq!(pending.products, sku7());

    let captured = orders
        .mark_payment_captured(&order_id, &TransactionId::new("TXN-000001"))
        .await
        .unwrap();
    assert_eq!(captured.status, OrderStatus::PaymentCaptured);
    assert_eq!(captured.transaction_id, Some(TransactionId::new("TXN-000001")));

    // Terminal orders refuse further transitions
    let err = orders.mark_failed(&order_id, "late").await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = orders
        .get_order(&OrderId::new("ORD-999999"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = orders
        .place_order(UserId::new(1), Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn test_failed_order_cancelled_over_the_wire() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let orders = &cluster.order_client;

    let order_id = orders.place_order(UserId::new(2), sku7()).await.unwrap();
    let failed = orders
        .mark_failed(&order_id, "payment declined")
        .await
        .unwrap();
    assert_eq!(failed.status, OrderStatus::Failed);
    assert_eq!(failed.failure_reason.as_deref(), Some("payment declined"));

    let cancelled = orders.cancel_order(&order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(
        cluster.ledger.get_order(&order_id).await.unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn test_payment_amount_survives_unit_conversion() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let order_id = OrderId::new("ORD-000001");

    let outcome = cluster
        .payment_client
        .process_payment(&order_id, Money::from_cents(10050))
        .await
        .unwrap();
    assert!(outcome.success);

    let stored = cluster
        .payments
        .get_transaction(&outcome.transaction_id)
        .await
        .unwrap();
    assert_eq!(stored.amount, Money::from_cents(10050));

    cluster
        .payment_client
        .refund_payment(&outcome.transaction_id)
        .await
        .unwrap();
    assert!(
        cluster
            .payments
            .get_transaction(&outcome.transaction_id)
            .await
            .unwrap()
            .refunded
    );

    // Refunding twice is refused by the processor
    let err = cluster
        .payment_client
        .refund_payment(&outcome.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_refund_order_captures_over_rpc() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let order_id = OrderId::new("ORD-000001");

    let outcome = cluster
        .payment_client
        .process_payment(&order_id, Money::from_cents(10050))
        .await
        .unwrap();

    let refunded = cluster
        .payment_client
        .refund_order_captures(&order_id)
        .await
        .unwrap();
    assert_eq!(refunded, vec![outcome.transaction_id]);

    // The order is closed to captures that arrive afterwards.
    let late = cluster
        .payment_client
        .process_payment(&order_id, Money::from_cents(10050))
        .await
        .unwrap_err();
    assert!(matches!(late, ServiceError::Conflict(_)));
    assert_eq!(cluster.payments.transaction_count().await, 1);
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let client = UserServiceClient::connect(&dead_address().await, TIMEOUT).unwrap();

    let err = client.get_user(UserId::new(1)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert!(err.is_infrastructure());
}

#[tokio::test]
async fn test_hanging_server_times_out() {
    let payments = FaultInjector::new(PaymentProcessor::new());
    payments.inject(methods::PROCESS_PAYMENT, Fault::Hang);
    let addr = spawn(payment_router(Arc::new(payments))).await;
    let client = PaymentServiceClient::connect(&addr, Duration::from_millis(200)).unwrap();

    let err = client
        .process_payment(&OrderId::new("ORD-000001"), Money::from_cents(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Timeout(_)));
}

#[tokio::test]
async fn test_saga_completes_across_services() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let orchestrator = cluster.orchestrator();

    let placement = orchestrator
        .place_order(UserId::new(1), sku7())
        .await
        .unwrap();

    let order = cluster.ledger.get_order(&placement.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentCaptured);
    assert_eq!(order.transaction_id, Some(placement.transaction_id.clone()));

    let tx = cluster
        .payments
        .get_transaction(&placement.transaction_id)
        .await
        .unwrap();
    assert_eq!(tx.amount, Money::from_cents(10050));

    let saga = orchestrator
        .saga_for_order(&placement.order_id)
        .await
        .unwrap();
    assert_eq!(saga.state(), SagaState::Completed);
}

#[tokio::test]
async fn test_saga_declined_across_services() {
    let cluster = Cluster::start(DeclinePolicy::DeclineAll).await;

    let err = cluster
        .orchestrator()
        .place_order(UserId::new(2), sku7())
        .await
        .unwrap_err();

    let order_id = match &err {
        SagaError::PaymentDeclined { order_id, .. } => order_id.clone(),
        other => panic!("expected a decline, got {other:?}"),
    };
    let order = cluster.ledger.get_order(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_saga_compensates_when_payment_service_is_down() {
    let cluster = Cluster::start(DeclinePolicy::ApproveAll).await;
    let payments = PaymentServiceClient::connect(&dead_address().await, TIMEOUT).unwrap();
    let orchestrator = OrderOrchestrator::new(
        Arc::new(cluster.user_client.clone()),
        Arc::new(cluster.order_client.clone()),
        Arc::new(payments),
    );

    let err = orchestrator
        .place_order(UserId::new(3), sku7())
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let order_id = err.order_id().unwrap().clone();
    let order = cluster.ledger.get_order(&order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(cluster.payments.transaction_count().await, 0);
}
