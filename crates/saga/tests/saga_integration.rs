//! Integration tests for the order placement saga.

use std::collections::HashSet;
use std::sync::Arc;

use common::{Money, OrderId, ProductId, SequentialIdGenerator, UserId};
use domain::{DeclinePolicy, OrderLedger, OrderStatus, PaymentProcessor, UserDirectory};
use futures_util::future::join_all;
use saga::{OrderOrchestrator, OrderService, PriceList, SagaError, SagaState, UserService};

struct TestHarness {
    orchestrator: OrderOrchestrator,
    users: UserDirectory,
    ledger: OrderLedger,
    payments: PaymentProcessor,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_policy(DeclinePolicy::ApproveAll).await
    }

    async fn with_policy(policy: DeclinePolicy) -> Self {
        let users = UserDirectory::with_demo_users().await;
        let ledger = OrderLedger::new();
        let payments = PaymentProcessor::new().with_policy(policy);
        let orchestrator = OrderOrchestrator::new(
            Arc::new(users.clone()),
            Arc::new(ledger.clone()),
            Arc::new(payments.clone()),
        );
        Self {
            orchestrator,
            users,
            ledger,
            payments,
        }
    }

    async fn successful_captures(&self, order_id: &OrderId) -> usize {
        self.payments
            .transactions_for_order(order_id)
            .await
            .iter()
            .filter(|tx| tx.is_active_capture())
            .count()
    }
}

fn products(ids: &[&str]) -> Vec<ProductId> {
    ids.iter().copied().map(ProductId::from).collect()
}

#[tokio::test]
async fn test_alice_orders_sku_7() {
    let h = TestHarness::new().await;

    let placement = h
        .orchestrator
        .place_order(UserId::new(1), products(&["sku-7"]))
        .await
        .unwrap();

    // Verify the order reached its terminal state
    let order = h.ledger.get_order(&placement.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentCaptured);
    assert_eq!(order.user_id, UserId::new(1));
    assert_eq!(order.products, products(&["sku-7"]));

    // Exactly one successful transaction, charged the derived amount
    assert_eq!(h.successful_captures(&placement.order_id).await, 1);
    let tx = h
        .payments
        .get_transaction(&placement.transaction_id)
        .await
        .unwrap();
    assert!(tx.success);
    assert_eq!(tx.amount, placement.amount);
    assert_eq!(tx.order_id, placement.order_id);

    // Verify the saga record
    let saga = h
        .orchestrator
        .saga_for_order(&placement.order_id)
        .await
        .unwrap();
    assert_eq!(saga.id(), Some(placement.saga_id));
    assert_eq!(saga.state(), SagaState::Completed);
    assert_eq!(saga.saga_type(), "OrderPlacement");
}

#[tokio::test]
async fn test_unknown_user_999() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .place_order(UserId::new(999), products(&["sku-7"]))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::UserNotFound(_)));
    assert_eq!(h.ledger.order_count().await, 0);
    assert_eq!(h.payments.transaction_count().await, 0);
}

#[tokio::test]
async fn test_amount_is_derived_from_products() {
    let users = UserDirectory::with_demo_users().await;
    let payments = PaymentProcessor::new();
    let prices = PriceList::new(None)
        .with_price("sku-1", Money::from_cents(1999))
        .with_price("sku-2", Money::from_cents(501));
    let orchestrator = OrderOrchestrator::new(
        Arc::new(users),
        Arc::new(OrderLedger::new()),
        Arc::new(payments.clone()),
    )
    .with_price_list(prices);

    let placement = orchestrator
        .place_order(UserId::new(2), products(&["sku-1", "sku-2", "sku-2"]))
        .await
        .unwrap();

    assert_eq!(placement.amount, Money::from_cents(1999 + 501 + 501));
    let tx = payments
        .get_transaction(&placement.transaction_id)
        .await
        .unwrap();
    assert_eq!(tx.amount, Money::from_cents(3001));
}

#[tokio::test]
async fn test_declined_payment_never_leaves_order_pending() {
    let h = TestHarness::with_policy(DeclinePolicy::DeclineAll).await;

    for user in 1..=3 {
        let err = h
            .orchestrator
            .place_order(UserId::new(user), products(&["sku-7"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::PaymentDeclined { .. }));
    }

    assert_eq!(h.ledger.order_count().await, 3);
    assert_eq!(h.ledger.count_with_status(OrderStatus::Failed).await, 3);
    assert_eq!(h.ledger.count_with_status(OrderStatus::Pending).await, 0);
}

#[tokio::test]
async fn test_decline_above_limit_splits_outcomes() {
    let h = TestHarness::with_policy(DeclinePolicy::DeclineAbove(Money::from_cents(20000))).await;

    // One unit at $100.50 passes, three units do not.
    let small = h
        .orchestrator
        .place_order(UserId::new(1), products(&["sku-7"]))
        .await;
    let large = h
        .orchestrator
        .place_order(UserId::new(1), products(&["sku-7", "sku-8", "sku-9"]))
        .await;

    let small = small.unwrap();
    let large = large.unwrap_err();

    let small_order = h.ledger.get_order(&small.order_id).await.unwrap();
    assert_eq!(small_order.status, OrderStatus::PaymentCaptured);

    let large_order = h.ledger.get_order(large.order_id().unwrap()).await.unwrap();
    assert_eq!(large_order.status, OrderStatus::Failed);

    let saga = h
        .orchestrator
        .saga_for_order(large.order_id().unwrap())
        .await
        .unwrap();
    assert_eq!(saga.state(), SagaState::Compensated);
}

#[tokio::test]
async fn test_failed_order_can_be_cancelled_afterwards() {
    let h = TestHarness::with_policy(DeclinePolicy::DeclineAll).await;

    let err = h
        .orchestrator
        .place_order(UserId::new(3), products(&["sku-7"]))
        .await
        .unwrap_err();
    let order_id = err.order_id().unwrap();

    let cancelled = h
        .orchestrator
        .orders()
        .cancel_order(order_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_email_update_is_visible_to_later_lookups() {
    let h = TestHarness::new().await;

    h.orchestrator
        .users()
        .update_user(UserId::new(2), "bob@new.example".to_string())
        .await
        .unwrap();

    let bob = h.users.get_user(UserId::new(2)).await.unwrap();
    assert_eq!(bob.email, "bob@new.example");
}

#[tokio::test]
async fn test_saga_can_be_reloaded_from_log() {
    let h = TestHarness::new().await;

    let placement = h
        .orchestrator
        .place_order(UserId::new(1), products(&["sku-7"]))
        .await
        .unwrap();

    // Load saga twice; both loads should produce identical state
    let saga1 = h.orchestrator.get_saga(placement.saga_id).await.unwrap();
    let saga2 = h
        .orchestrator
        .saga_for_order(&placement.order_id)
        .await
        .unwrap();

    assert_eq!(saga1.id(), saga2.id());
    assert_eq!(saga1.state(), saga2.state());
    assert_eq!(saga1.order_id(), saga2.order_id());
    assert_eq!(saga1.completed_steps(), saga2.completed_steps());
    assert_eq!(saga1.transaction_id(), saga2.transaction_id());

    let entries = h
        .orchestrator
        .saga_log()
        .entries(placement.saga_id)
        .await;
    let versions: Vec<u64> = entries.iter().map(|e| e.version).collect();
    assert_eq!(versions, (1..=entries.len() as u64).collect::<Vec<_>>());
    assert_eq!(entries.first().unwrap().event_type, "SagaStarted");
    assert_eq!(entries.last().unwrap().event_type, "SagaCompleted");
}

#[tokio::test]
async fn test_one_saga_fails_other_succeeds() {
    let h = TestHarness::new().await;

    let ok = h
        .orchestrator
        .place_order(UserId::new(1), products(&["sku-1"]))
        .await
        .unwrap();

    h.payments.set_policy(DeclinePolicy::DeclineAll);
    let declined = h
        .orchestrator
        .place_order(UserId::new(2), products(&["sku-2"]))
        .await
        .unwrap_err();

    let order1 = h.ledger.get_order(&ok.order_id).await.unwrap();
    let order2 = h
        .ledger
        .get_order(declined.order_id().unwrap())
        .await
        .unwrap();
    assert_eq!(order1.status, OrderStatus::PaymentCaptured);
    assert_eq!(order2.status, OrderStatus::Failed);

    // The first capture is untouched by the second saga's compensation
    assert_eq!(h.successful_captures(&ok.order_id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_are_isolated() {
    let users = UserDirectory::with_demo_users().await;
    let ledger = OrderLedger::with_id_generator(Arc::new(SequentialIdGenerator::starting_at(
        "ORD", 500,
    )));
    let payments = PaymentProcessor::new();
    let orchestrator = OrderOrchestrator::new(
        Arc::new(users),
        Arc::new(ledger.clone()),
        Arc::new(payments.clone()),
    );

    let submissions = (0..60u64).map(|i| {
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .place_order_detached(UserId::new(1 + i % 3), products(&["sku-7"]))
                .await
                .unwrap()
        }
    });
    let placements = join_all(submissions).await;

    let order_ids: HashSet<_> = placements.iter().map(|p| p.order_id.clone()).collect();
    let tx_ids: HashSet<_> = placements
        .iter()
        .map(|p| p.transaction_id.clone())
        .collect();
    assert_eq!(order_ids.len(), 60);
    assert_eq!(tx_ids.len(), 60);
    assert!(order_ids.contains(&OrderId::new("ORD-000500")));
    assert_eq!(
        ledger.count_with_status(OrderStatus::PaymentCaptured).await,
        60
    );
    assert_eq!(payments.transaction_count().await, 60);
}
