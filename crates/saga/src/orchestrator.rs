//! Order orchestrator running the order placement saga.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{Money, OrderId, ProductId, SagaId, TransactionId, UserId};
use domain::OrderStatus;

use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::instance::SagaInstance;
use crate::order_placement::{
    SAGA_TYPE, STEP_CONFIRM_ORDER, STEP_MARK_ORDER_FAILED, STEP_PLACE_ORDER,
    STEP_PROCESS_PAYMENT, STEP_REFUND_PAYMENT, STEP_RESOLVE_USER,
};
use crate::pricing::PriceList;
use crate::saga_log::SagaLog;
use crate::services::{OrderService, PaymentService, ServiceError, UserService, methods};

/// Upper bound on every outbound service call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(2000);

/// A successfully placed and paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlacement {
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
    pub amount: Money,
}

/// What the saga knows about the money when it compensates.
#[derive(Debug, Clone, Copy)]
enum Capture<'a> {
    /// Nothing was captured.
    None,
    /// The processor reported this capture.
    Known(&'a TransactionId),
    /// The payment call got no answer; a capture may have landed.
    Unknown,
}

/// A saga being executed: its id, its folded state and where its events go.
struct SagaRun {
    saga_id: SagaId,
    saga: SagaInstance,
    log: SagaLog,
}

impl SagaRun {
    async fn record(&mut self, event: SagaEvent) {
        self.log.append(self.saga_id, event.clone()).await;
        self.saga.apply(event);
    }
}

/// Sequences user lookup, order placement and payment capture, and
/// compensates when a step after order creation fails.
///
/// The orchestrator drives a 3-step saga (place order → capture payment →
/// confirm order) after resolving the user and pricing the products. Every
/// saga is recorded in the [`SagaLog`].
#[derive(Clone)]
pub struct OrderOrchestrator {
    users: Arc<dyn UserService>,
    orders: Arc<dyn OrderService>,
    payments: Arc<dyn PaymentService>,
    prices: Arc<PriceList>,
    log: SagaLog,
    call_timeout: Duration,
}

impl std::fmt::Debug for OrderOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderOrchestrator")
            .field("prices", &self.prices)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl OrderOrchestrator {
    /// Creates an orchestrator with the default price list and call timeout.
    pub fn new(
        users: Arc<dyn UserService>,
        orders: Arc<dyn OrderService>,
        payments: Arc<dyn PaymentService>,
    ) -> Self {
        Self {
            users,
            orders,
            payments,
            prices: Arc::new(PriceList::default()),
            log: SagaLog::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Replaces the price list.
    pub fn with_price_list(mut self, prices: PriceList) -> Self {
        self.prices = Arc::new(prices);
        self
    }

    /// Replaces the per-call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Returns the user service port.
    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.users
    }

    /// Returns the order service port.
    pub fn orders(&self) -> &Arc<dyn OrderService> {
        &self.orders
    }

    /// Returns the payment service port.
    pub fn payments(&self) -> &Arc<dyn PaymentService> {
        &self.payments
    }

    pub fn price_list(&self) -> &PriceList {
        &self.prices
    }

    pub fn saga_log(&self) -> &SagaLog {
        &self.log
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Places an order for `user_id` and captures its payment.
    ///
    /// Fails without side effects if the input is invalid, the user is
    /// unknown or the order cannot be recorded. Once the order exists every
    /// failure leaves it `Failed` (or, if the ledger is unreachable, records
    /// why it could not be) before returning.
    #[tracing::instrument(skip(self, products), fields(saga_type = SAGA_TYPE))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderPlacement, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let saga_id = SagaId::new();
        let mut run = SagaRun {
            saga_id,
            saga: SagaInstance::default(),
            log: self.log.clone(),
        };
        run.record(SagaEvent::saga_started(
            saga_id,
            user_id,
            products.clone(),
            SAGA_TYPE,
        ))
        .await;

        let result = self.execute(&mut run, user_id, products).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        match &result {
            Ok(placement) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%saga_id, order_id = %placement.order_id, duration, "saga completed successfully");
            }
            Err(err) if run.saga.is_aborted() => {
                metrics::counter!("saga_aborted").increment(1);
                tracing::warn!(%saga_id, error = %err, "saga aborted");
            }
            Err(err) => {
                metrics::counter!("saga_compensated").increment(1);
                tracing::warn!(%saga_id, order_id = ?err.order_id(), error = %err, "saga compensated");
            }
        }
        result
    }

    /// Runs [`place_order`](Self::place_order) on its own task.
    ///
    /// Dropping the returned future does not stop the saga; it still runs to
    /// completion or compensation.
    pub async fn place_order_detached(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderPlacement, SagaError> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.place_order(user_id, products).await })
            .await
            .map_err(|e| SagaError::Internal(format!("saga task failed: {e}")))?
    }

    /// Loads a saga by ID.
    pub async fn get_saga(&self, saga_id: SagaId) -> Option<SagaInstance> {
        self.log.load(saga_id).await
    }

    /// Loads the saga that created the given order.
    pub async fn saga_for_order(&self, order_id: &OrderId) -> Option<SagaInstance> {
        self.log.load_for_order(order_id).await
    }

    async fn execute(
        &self,
        run: &mut SagaRun,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderPlacement, SagaError> {
        // 1. Validate the request
        if products.is_empty() {
            let err = SagaError::InvalidInput("products must not be empty".to_string());
            return Err(Self::abort(run, err).await);
        }
        if products.iter().any(ProductId::is_blank) {
            let err = SagaError::InvalidInput("product ids must not be blank".to_string());
            return Err(Self::abort(run, err).await);
        }

        // 2. Resolve the user
        run.record(SagaEvent::step_started(STEP_RESOLVE_USER)).await;
        if let Err(e) = self
            .call(methods::GET_USER, self.users.get_user(user_id))
            .await
        {
            let err = match e {
                ServiceError::NotFound(_) => SagaError::UserNotFound(user_id),
                other => SagaError::from_service(STEP_RESOLVE_USER, None, other),
            };
            run.record(SagaEvent::step_failed(STEP_RESOLVE_USER, err.to_string()))
                .await;
            return Err(Self::abort(run, err).await);
        }
        run.record(SagaEvent::step_completed(STEP_RESOLVE_USER))
            .await;

        // 3. Price the order before anything is created
        let amount = match self.prices.quote(&products) {
            Ok(amount) => amount,
            Err(e) => return Err(Self::abort(run, SagaError::InvalidInput(e.to_string())).await),
        };

        // 4. Step 1: Place the order
        tracing::info!(step = STEP_PLACE_ORDER, "saga step started");
        run.record(SagaEvent::step_started(STEP_PLACE_ORDER)).await;
        let order_id = match self
            .call(
                methods::PLACE_ORDER,
                self.orders.place_order(user_id, products),
            )
            .await
        {
            Ok(order_id) => order_id,
            Err(e) => {
                let err = SagaError::from_service(STEP_PLACE_ORDER, None, e);
                run.record(SagaEvent::step_failed(STEP_PLACE_ORDER, err.to_string()))
                    .await;
                return Err(Self::abort(run, err).await);
            }
        };
        run.record(SagaEvent::order_created(
            STEP_PLACE_ORDER,
            order_id.clone(),
            amount,
        ))
        .await;

        // 5. Step 2: Capture payment
        tracing::info!(step = STEP_PROCESS_PAYMENT, %order_id, %amount, "saga step started");
        run.record(SagaEvent::step_started(STEP_PROCESS_PAYMENT))
            .await;
        let transaction_id = match self
            .call(
                methods::PROCESS_PAYMENT,
                self.payments.process_payment(&order_id, amount),
            )
            .await
        {
            Ok(outcome) if outcome.success => {
                run.record(SagaEvent::payment_captured(
                    STEP_PROCESS_PAYMENT,
                    outcome.transaction_id.clone(),
                ))
                .await;
                outcome.transaction_id
            }
            Ok(outcome) => {
                run.record(SagaEvent::payment_declined(
                    STEP_PROCESS_PAYMENT,
                    outcome.transaction_id.clone(),
                ))
                .await;
                let marked = self.fail_order(run, &order_id).await;
                self.compensate(run, STEP_PROCESS_PAYMENT, &order_id, marked, Capture::None)
                    .await;
                return Err(SagaError::PaymentDeclined {
                    order_id,
                    transaction_id: outcome.transaction_id,
                });
            }
            Err(e) => {
                run.record(SagaEvent::step_failed(STEP_PROCESS_PAYMENT, e.to_string()))
                    .await;
                let capture = if e.is_infrastructure() {
                    Capture::Unknown
                } else {
                    Capture::None
                };
                let marked = self.fail_order(run, &order_id).await;
                self.compensate(run, STEP_PROCESS_PAYMENT, &order_id, marked, capture)
                    .await;
                return Err(if e.is_infrastructure() {
                    SagaError::from_service(STEP_PROCESS_PAYMENT, Some(order_id), e)
                } else {
                    SagaError::PaymentRejected {
                        order_id,
                        reason: e.to_string(),
                    }
                });
            }
        };

        // 6. Step 3: Confirm the capture on the order
        tracing::info!(step = STEP_CONFIRM_ORDER, %order_id, "saga step started");
        run.record(SagaEvent::step_started(STEP_CONFIRM_ORDER))
            .await;
        let confirmation = self
            .call(
                methods::MARK_PAYMENT_CAPTURED,
                self.orders.mark_payment_captured(&order_id, &transaction_id),
            )
            .await;
        if let Err(e) = confirmation {
            let applied = e.is_infrastructure()
                && self.confirmed_on_read_back(&order_id, &transaction_id).await;
            if !applied {
                run.record(SagaEvent::step_failed(STEP_CONFIRM_ORDER, e.to_string()))
                    .await;
                let marked = self.fail_order(run, &order_id).await;

                // A conflict means the order left Pending, which only the lost
                // confirmation could have done.
                let conflict = match &marked {
                    Err(ServiceError::Conflict(conflict)) => Some(conflict.clone()),
                    _ => None,
                };
                if let Some(conflict) = conflict {
                    if self.confirmed_on_read_back(&order_id, &transaction_id).await {
                        tracing::info!(%order_id, "confirmation found applied after mark-failed conflict");
                        run.record(SagaEvent::confirmation_reconciled(e.to_string()))
                            .await;
                        return Ok(Self::complete(run, order_id, transaction_id, amount).await);
                    }
                    self.compensate(
                        run,
                        STEP_CONFIRM_ORDER,
                        &order_id,
                        marked,
                        Capture::Known(&transaction_id),
                    )
                    .await;
                    return Err(SagaError::Conflict {
                        reason: format!(
                            "order {order_id} is no longer pending and its confirmation could not be verified: {conflict}"
                        ),
                        order_id: Some(order_id),
                    });
                }

                self.compensate(
                    run,
                    STEP_CONFIRM_ORDER,
                    &order_id,
                    marked,
                    Capture::Known(&transaction_id),
                )
                .await;
                return Err(SagaError::from_service(
                    STEP_CONFIRM_ORDER,
                    Some(order_id),
                    e,
                ));
            }
            tracing::info!(%order_id, error = %e, "confirmation found applied on read-back");
            run.record(SagaEvent::confirmation_reconciled(e.to_string()))
                .await;
        }

        // 7. Saga completed
        Ok(Self::complete(run, order_id, transaction_id, amount).await)
    }

    async fn complete(
        run: &mut SagaRun,
        order_id: OrderId,
        transaction_id: TransactionId,
        amount: Money,
    ) -> OrderPlacement {
        run.record(SagaEvent::step_completed(STEP_CONFIRM_ORDER))
            .await;
        run.record(SagaEvent::SagaCompleted).await;
        OrderPlacement {
            saga_id: run.saga_id,
            order_id,
            transaction_id,
            amount,
        }
    }

    /// Asks the ledger to mark the order failed with the saga's failure
    /// reason.
    async fn fail_order(
        &self,
        run: &SagaRun,
        order_id: &OrderId,
    ) -> Result<(), ServiceError> {
        let reason = run.saga.failure_reason().unwrap_or("unknown failure");
        self.call(methods::MARK_FAILED, self.orders.mark_failed(order_id, reason))
            .await
            .map(|_| ())
    }

    /// Records the outcome of marking the order failed, then reverses the
    /// capture.
    ///
    /// The refund is skipped when the ledger reported a conflict, since the
    /// order is then no longer pending and may hold the capture.
    #[tracing::instrument(skip(self, run, marked, capture), fields(saga_id = %run.saga_id))]
    async fn compensate(
        &self,
        run: &mut SagaRun,
        from_step: &'static str,
        order_id: &OrderId,
        marked: Result<(), ServiceError>,
        capture: Capture<'_>,
    ) {
        let reason = run
            .saga
            .failure_reason()
            .unwrap_or("unknown failure")
            .to_string();
        run.record(SagaEvent::compensation_started(from_step)).await;

        let refund_allowed = !matches!(marked, Err(ServiceError::Conflict(_)));
        match marked {
            Ok(()) => {
                run.record(SagaEvent::compensation_step_completed(
                    STEP_MARK_ORDER_FAILED,
                ))
                .await;
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "could not mark order failed");
                run.record(SagaEvent::compensation_step_failed(
                    STEP_MARK_ORDER_FAILED,
                    e.to_string(),
                ))
                .await;
            }
        }

        let refund = match capture {
            Capture::None => None,
            _ if !refund_allowed => Some(Err("skipped: order is no longer pending".to_string())),
            Capture::Known(transaction_id) => Some(
                self.call(
                    methods::REFUND_PAYMENT,
                    self.payments.refund_payment(transaction_id),
                )
                .await
                .map_err(|e| {
                    tracing::error!(%transaction_id, error = %e, "could not refund payment");
                    e.to_string()
                }),
            ),
            Capture::Unknown => Some(
                self.call(
                    methods::REFUND_ORDER_CAPTURES,
                    self.payments.refund_order_captures(order_id),
                )
                .await
                .map(|refunded| {
                    if !refunded.is_empty() {
                        tracing::warn!(%order_id, ?refunded, "refunded a capture whose answer was lost");
                    }
                })
                .map_err(|e| {
                    tracing::error!(%order_id, error = %e, "could not void order payments");
                    e.to_string()
                }),
            ),
        };
        match refund {
            None => {}
            Some(Ok(())) => {
                run.record(SagaEvent::compensation_step_completed(
                    STEP_REFUND_PAYMENT,
                ))
                .await;
            }
            Some(Err(error)) => {
                run.record(SagaEvent::compensation_step_failed(
                    STEP_REFUND_PAYMENT,
                    error,
                ))
                .await;
            }
        }

        run.record(SagaEvent::saga_compensated(reason)).await;
    }

    /// Returns true if the order already records `transaction_id` as its
    /// capture.
    async fn confirmed_on_read_back(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> bool {
        match self
            .call(methods::GET_ORDER, self.orders.get_order(order_id))
            .await
        {
            Ok(order) => {
                order.status == OrderStatus::PaymentCaptured
                    && order.transaction_id.as_ref() == Some(transaction_id)
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "order read-back failed");
                false
            }
        }
    }

    async fn abort(run: &mut SagaRun, err: SagaError) -> SagaError {
        run.record(SagaEvent::saga_aborted(err.to_string())).await;
        err
    }

    /// Awaits a service call, bounded by the call timeout.
    async fn call<T>(
        &self,
        method: &'static str,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(format!(
                "{method} did not answer within {}ms",
                self.call_timeout.as_millis()
            ))),
        };
        metrics::histogram!("saga_call_duration_seconds", "method" => method)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::debug!(method, error = %e, "service call failed");
        }
        result
    }
}
