//! Order ledger service.

use std::sync::Arc;

use common::{IdGenerator, OrderId, ProductId, SequentialIdGenerator, TransactionId, UserId};

use super::{Order, OrderError, OrderStatus};
use crate::error::DomainError;
use crate::store::EntityStore;

/// Accepts order placements, assigns order ids and records order status.
///
/// The ledger trusts the caller to have resolved `user_id` already; it does
/// not consult the user directory.
#[derive(Clone)]
pub struct OrderLedger {
    orders: EntityStore<OrderId, Order>,
    ids: Arc<dyn IdGenerator>,
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLedger").finish_non_exhaustive()
    }
}

impl OrderLedger {
    /// Creates a ledger issuing `ORD-000001`, `ORD-000002`, ...
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(SequentialIdGenerator::new("ORD")))
    }

    /// Creates a ledger with a custom order id source.
    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            orders: EntityStore::new(),
            ids,
        }
    }

    /// Records a new `Pending` order and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderId, DomainError> {
        if products.is_empty() {
            return Err(DomainError::invalid_input("products must not be empty"));
        }
        if products.iter().any(ProductId::is_blank) {
            return Err(DomainError::invalid_input("product ids must not be blank"));
        }

        let order_id = OrderId::new(self.ids.next_id());
        let order = Order::new(order_id.clone(), user_id, products);
        if !self.orders.insert_new(order_id.clone(), order).await {
            tracing::error!(%order_id, "id generator reissued an order id");
            return Err(OrderError::DuplicateOrderId { order_id }.into());
        }

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(%order_id, %user_id, "order placed");
        Ok(order_id)
    }

    /// Returns the order with the given id.
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, DomainError> {
        self.orders
            .get(order_id)
            .await
            .ok_or_else(|| DomainError::OrderNotFound(order_id.clone()))
    }

    /// Moves a `Pending` order to `PaymentCaptured`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_payment_captured(
        &self,
        order_id: &OrderId,
        transaction_id: TransactionId,
    ) -> Result<Order, DomainError> {
        let order = self
            .transition(order_id, |order| order.capture(transaction_id))
            .await?;
        tracing::info!(%order_id, "order payment captured");
        Ok(order)
    }

    /// Moves a `Pending` order to `Failed`.
    #[tracing::instrument(skip(self, reason))]
    pub async fn mark_failed(
        &self,
        order_id: &OrderId,
        reason: impl Into<String>,
    ) -> Result<Order, DomainError> {
        let reason = reason.into();
        let order = self
            .transition(order_id, |order| order.fail(reason))
            .await?;
        tracing::warn!(%order_id, reason = ?order.failure_reason, "order marked failed");
        Ok(order)
    }

    /// Moves a `Failed` order to `Cancelled`.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, DomainError> {
        let order = self
            .transition(order_id, |order| order.cancel())
            .await?;
        tracing::info!(%order_id, "order cancelled");
        Ok(order)
    }

    /// Returns the number of orders recorded.
    pub async fn order_count(&self) -> usize {
        self.orders.len().await
    }

    /// Returns the number of orders currently in `status`.
    pub async fn count_with_status(&self, status: OrderStatus) -> usize {
        self.orders
            .values()
            .await
            .iter()
            .filter(|order| order.status == status)
            .count()
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        f: impl FnOnce(&mut Order) -> Result<(), super::OrderError>,
    ) -> Result<Order, DomainError> {
        let result = self
            .orders
            .update(order_id, |order| {
                f(order)?;
                Ok::<_, super::OrderError>(order.clone())
            })
            .await
            .ok_or_else(|| DomainError::OrderNotFound(order_id.clone()))?;
        let order = result?;
        metrics::counter!("order_status_transitions_total", "status" => order.status.as_str())
            .increment(1);
        Ok(order)
    }
}
