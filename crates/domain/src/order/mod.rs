//! Order records and the order ledger service.

mod ledger;
mod state;

pub use ledger::OrderLedger;
pub use state::OrderStatus;

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, TransactionId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during order status transitions.
#[derive(Debug, Clone, Error)]
pub enum OrderError {
    /// Order is not in a status that allows the requested action.
    #[error("Invalid state transition for order {order_id}: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        order_id: OrderId,
        current_status: OrderStatus,
        action: &'static str,
    },

    /// The id generator issued an id that is already in use.
    #[error("Order id {order_id} was already issued")]
    DuplicateOrderId { order_id: OrderId },
}

/// An order recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub products: Vec<ProductId>,
    pub status: OrderStatus,
    /// Set once the payment is captured.
    pub transaction_id: Option<TransactionId>,
    /// Set when the order is marked failed.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    fn new(order_id: OrderId, user_id: UserId, products: Vec<ProductId>) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            user_id,
            products,
            status: OrderStatus::Pending,
            transaction_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the captured payment.
    fn capture(&mut self, transaction_id: TransactionId) -> Result<(), OrderError> {
        self.guard(self.status.can_capture(), "capture payment")?;
        self.status = OrderStatus::PaymentCaptured;
        self.transaction_id = Some(transaction_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the order failed with a reason.
    fn fail(&mut self, reason: String) -> Result<(), OrderError> {
        self.guard(self.status.can_fail(), "mark failed")?;
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Closes a failed order.
    fn cancel(&mut self) -> Result<(), OrderError> {
        self.guard(self.status.can_cancel(), "cancel")?;
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn guard(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                order_id: self.order_id.clone(),
                current_status: self.status,
                action,
            })
        }
    }
}
