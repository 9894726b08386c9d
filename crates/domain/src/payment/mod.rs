//! Payment transactions and the payment processor service.

mod policy;
mod processor;

pub use policy::DeclinePolicy;
pub use processor::PaymentProcessor;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, TransactionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while capturing or refunding payments.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// The order already holds an active successful transaction.
    #[error("Order {order_id} already captured by transaction {transaction_id}")]
    AlreadyCaptured {
        order_id: OrderId,
        transaction_id: TransactionId,
    },

    /// The order's payments were voided; it accepts no further captures.
    #[error("Order {order_id} no longer accepts payments")]
    OrderClosed { order_id: OrderId },

    /// The transaction cannot be refunded.
    #[error("Transaction {transaction_id} cannot be refunded: {reason}")]
    NotRefundable {
        transaction_id: TransactionId,
        reason: &'static str,
    },
}

/// One payment attempt against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub amount: Money,
    /// Outcome decided when the attempt was processed.
    pub success: bool,
    /// Set when a successful capture is later refunded.
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentTransaction {
    fn new(transaction_id: TransactionId, order_id: OrderId, amount: Money, success: bool) -> Self {
        Self {
            transaction_id,
            order_id,
            amount,
            success,
            refunded: false,
            created_at: Utc::now(),
        }
    }

    /// Returns true if this transaction currently holds the order's money.
    pub fn is_active_capture(&self) -> bool {
        self.success && !self.refunded
    }
}
