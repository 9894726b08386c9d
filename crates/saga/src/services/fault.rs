//! Fault injection wrapper for the service ports.
//!
//! Wraps any port implementation and makes selected methods fail the way a
//! broken network would, so the orchestrator's failure paths can be driven
//! without a real outage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, TransactionId, UserId};
use domain::{Order, User};

use super::{OrderService, PaymentOutcome, PaymentService, ServiceError, UserService, methods};

/// How a wrapped method misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The call never reaches the service.
    Unavailable,
    /// Like `Unavailable`, for the next call only.
    UnavailableOnce,
    /// The call reaches the service and is applied, but the answer is lost.
    LoseResponse,
    /// The call never answers.
    Hang,
}

/// A port implementation with switchable per-method faults.
#[derive(Debug, Clone)]
pub struct FaultInjector<S> {
    inner: S,
    faults: Arc<Mutex<HashMap<&'static str, Fault>>>,
}

impl<S> FaultInjector<S> {
    /// Wraps `inner` with no faults configured.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Makes every subsequent call to `method` fail with `fault`.
    pub fn inject(&self, method: &'static str, fault: Fault) {
        self.lock().insert(method, fault);
    }

    /// Restores normal behaviour for `method`.
    pub fn clear(&self, method: &'static str) {
        self.lock().remove(method);
    }

    /// Returns the wrapped implementation.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Fault>> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fault(&self, method: &'static str) -> Option<Fault> {
        let mut faults = self.lock();
        let fault = faults.get(method).copied();
        if fault == Some(Fault::UnavailableOnce) {
            faults.remove(method);
        }
        fault
    }

    async fn call<T, F>(&self, method: &'static str, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>> + Send,
    {
        match self.fault(method) {
            None => call.await,
            Some(Fault::Unavailable | Fault::UnavailableOnce) => Err(ServiceError::Unavailable(format!(
                "{method}: connection refused"
            ))),
            Some(Fault::LoseResponse) => {
                let _ = call.await;
                Err(ServiceError::Unavailable(format!(
                    "{method}: connection reset before response"
                )))
            }
            Some(Fault::Hang) => {
                std::future::pending::<()>().await;
                Err(ServiceError::Timeout(format!("{method}: no response")))
            }
        }
    }
}

#[async_trait]
impl<S: UserService> UserService for FaultInjector<S> {
    async fn get_user(&self, user_id: UserId) -> Result<User, ServiceError> {
        self.call(methods::GET_USER, self.inner.get_user(user_id))
            .await
    }

    async fn update_user(&self, user_id: UserId, new_email: String) -> Result<User, ServiceError> {
        self.call(methods::UPDATE_USER, self.inner.update_user(user_id, new_email))
            .await
    }
}

#[async_trait]
impl<S: OrderService> OrderService for FaultInjector<S> {
    async fn place_order(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderId, ServiceError> {
        self.call(methods::PLACE_ORDER, self.inner.place_order(user_id, products))
            .await
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        self.call(methods::GET_ORDER, self.inner.get_order(order_id))
            .await
    }

    async fn mark_payment_captured(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Order, ServiceError> {
        self.call(
            methods::MARK_PAYMENT_CAPTURED,
            self.inner.mark_payment_captured(order_id, transaction_id),
        )
        .await
    }

    async fn mark_failed(&self, order_id: &OrderId, reason: &str) -> Result<Order, ServiceError> {
        self.call(methods::MARK_FAILED, self.inner.mark_failed(order_id, reason))
            .await
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        self.call(methods::CANCEL_ORDER, self.inner.cancel_order(order_id))
            .await
    }
}

#[async_trait]
impl<S: PaymentService> PaymentService for FaultInjector<S> {
    async fn process_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentOutcome, ServiceError> {
        self.call(
            methods::PROCESS_PAYMENT,
            self.inner.process_payment(order_id, amount),
        )
        .await
    }

    async fn refund_payment(&self, transaction_id: &TransactionId) -> Result<(), ServiceError> {
        self.call(
            methods::REFUND_PAYMENT,
            self.inner.refund_payment(transaction_id),
        )
        .await
    }

    async fn refund_order_captures(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<TransactionId>, ServiceError> {
        self.call(
            methods::REFUND_ORDER_CAPTURES,
            self.inner.refund_order_captures(order_id),
        )
        .await
    }
}
