//! Order service port.

use async_trait::async_trait;
use common::{OrderId, ProductId, TransactionId, UserId};
use domain::{Order, OrderLedger};

use super::ServiceError;

/// Order placement and status operations.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Records a new pending order and returns its id.
    async fn place_order(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderId, ServiceError>;

    /// Returns the order with the given id.
    async fn get_order(&self, order_id: &OrderId) -> Result<Order, ServiceError>;

    /// Moves a pending order to `PaymentCaptured`.
    async fn mark_payment_captured(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Order, ServiceError>;

    /// Moves a pending order to `Failed`.
    async fn mark_failed(&self, order_id: &OrderId, reason: &str) -> Result<Order, ServiceError>;

    /// Closes a failed order.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ServiceError>;
}

#[async_trait]
impl OrderService for OrderLedger {
    async fn place_order(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderId, ServiceError> {
        Ok(OrderLedger::place_order(self, user_id, products).await?)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        Ok(OrderLedger::get_order(self, order_id).await?)
    }

    async fn mark_payment_captured(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Order, ServiceError> {
        Ok(OrderLedger::mark_payment_captured(self, order_id, transaction_id.clone()).await?)
    }

    async fn mark_failed(&self, order_id: &OrderId, reason: &str) -> Result<Order, ServiceError> {
        Ok(OrderLedger::mark_failed(self, order_id, reason).await?)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        Ok(OrderLedger::cancel_order(self, order_id).await?)
    }
}
