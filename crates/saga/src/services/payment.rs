//! Payment service port.

use async_trait::async_trait;
use common::{Money, OrderId, TransactionId};
use domain::PaymentProcessor;
use serde::{Deserialize, Serialize};

use super::ServiceError;

/// Result of a payment attempt the processor answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// The transaction id assigned by the payment processor.
    pub transaction_id: TransactionId,
    /// False when the payment was declined.
    pub success: bool,
}

/// Payment capture and refund operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Attempts to capture `amount` for the order.
    async fn process_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentOutcome, ServiceError>;

    /// Refunds a previously captured payment.
    async fn refund_payment(&self, transaction_id: &TransactionId) -> Result<(), ServiceError>;

    /// Refunds whatever the order holds and refuses later captures for it.
    ///
    /// Returns the refunded transactions, possibly none.
    async fn refund_order_captures(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<TransactionId>, ServiceError>;
}

#[async_trait]
impl PaymentService for PaymentProcessor {
    async fn process_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentOutcome, ServiceError> {
        let transaction = PaymentProcessor::process_payment(self, order_id, amount).await?;
        Ok(PaymentOutcome {
            transaction_id: transaction.transaction_id,
            success: transaction.success,
        })
    }

    async fn refund_payment(&self, transaction_id: &TransactionId) -> Result<(), ServiceError> {
        self.refund(transaction_id).await?;
        Ok(())
    }

    async fn refund_order_captures(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<TransactionId>, ServiceError> {
        let refunded = PaymentProcessor::refund_order_captures(self, order_id).await?;
        Ok(refunded.into_iter().map(|tx| tx.transaction_id).collect())
    }
}
