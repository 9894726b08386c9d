//! Payment processor service.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use common::{IdGenerator, Money, OrderId, SequentialIdGenerator, TransactionId};
use tokio::sync::RwLock;

use super::{DeclinePolicy, PaymentError, PaymentTransaction};
use crate::error::DomainError;
use crate::store::EntityStore;

/// Payment attempts recorded against one order.
#[derive(Debug, Clone, Default)]
struct OrderPayments {
    transactions: Vec<PaymentTransaction>,
    /// Set once the order's captures were voided.
    closed: bool,
}

/// Accepts payment captures against orders and records their outcome.
///
/// Transactions are grouped per order and every capture runs under that
/// order's lock, so an order can never hold two active successful
/// transactions. The processor does not verify that the order exists.
#[derive(Clone)]
pub struct PaymentProcessor {
    by_order: EntityStore<OrderId, OrderPayments>,
    by_transaction: Arc<RwLock<HashMap<TransactionId, OrderId>>>,
    ids: Arc<dyn IdGenerator>,
    policy: Arc<std::sync::RwLock<DeclinePolicy>>,
}

impl Default for PaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PaymentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentProcessor")
            .field("policy", &self.policy())
            .finish_non_exhaustive()
    }
}

impl PaymentProcessor {
    /// Creates a processor that approves every payment and issues
    /// `TXN-000001`, `TXN-000002`, ...
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(SequentialIdGenerator::new("TXN")))
    }

    /// Creates a processor with a custom transaction id source.
    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            by_order: EntityStore::new(),
            by_transaction: Arc::new(RwLock::new(HashMap::new())),
            ids,
            policy: Arc::new(std::sync::RwLock::new(DeclinePolicy::default())),
        }
    }

    /// Sets the decline policy, builder style.
    pub fn with_policy(self, policy: DeclinePolicy) -> Self {
        self.set_policy(policy);
        self
    }

    /// Replaces the decline policy for subsequent payments.
    pub fn set_policy(&self, policy: DeclinePolicy) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    /// Returns the active decline policy.
    pub fn policy(&self) -> DeclinePolicy {
        *self.policy.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempts to capture `amount` for the order.
    ///
    /// A declined attempt is still recorded and returned with
    /// `success == false`; only malformed requests and double captures are
    /// errors.
    #[tracing::instrument(skip(self), fields(amount = %amount))]
    pub async fn process_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentTransaction, DomainError> {
        if order_id.is_blank() {
            return Err(DomainError::invalid_input("order_id must not be blank"));
        }
        if !amount.is_positive() {
            return Err(DomainError::invalid_input(format!(
                "amount must be positive, got {amount}"
            )));
        }

        let approved = self.policy().approves(amount);
        let ids = Arc::clone(&self.ids);
        let transaction = self
            .by_order
            .upsert(order_id.clone(), OrderPayments::default, |payments| {
                if payments.closed {
                    return Err(PaymentError::OrderClosed {
                        order_id: order_id.clone(),
                    });
                }
                if let Some(active) = payments.transactions.iter().find(|tx| tx.is_active_capture()) {
                    return Err(PaymentError::AlreadyCaptured {
                        order_id: order_id.clone(),
                        transaction_id: active.transaction_id.clone(),
                    });
                }
                let tx = PaymentTransaction::new(
                    TransactionId::new(ids.next_id()),
                    order_id.clone(),
                    amount,
                    approved,
                );
                payments.transactions.push(tx.clone());
                Ok(tx)
            })
            .await?;

        self.by_transaction
            .write()
            .await
            .insert(transaction.transaction_id.clone(), order_id.clone());

        let outcome = if transaction.success { "approved" } else { "declined" };
        metrics::counter!("payments_processed_total", "outcome" => outcome).increment(1);
        tracing::info!(
            transaction_id = %transaction.transaction_id,
            %order_id,
            success = transaction.success,
            "payment processed"
        );
        Ok(transaction)
    }

    /// Refunds an active successful capture.
    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<PaymentTransaction, DomainError> {
        let order_id = self
            .by_transaction
            .read()
            .await
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.clone()))?;

        let refunded = self
            .by_order
            .update(&order_id, |payments| -> Result<PaymentTransaction, DomainError> {
                let tx = payments
                    .transactions
                    .iter_mut()
                    .find(|tx| tx.transaction_id == *transaction_id)
                    .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.clone()))?;
                if !tx.success {
                    return Err(PaymentError::NotRefundable {
                        transaction_id: transaction_id.clone(),
                        reason: "payment was declined",
                    }
                    .into());
                }
                if tx.refunded {
                    return Err(PaymentError::NotRefundable {
                        transaction_id: transaction_id.clone(),
                        reason: "already refunded",
                    }
                    .into());
                }
                tx.refunded = true;
                Ok(tx.clone())
            })
            .await
            .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.clone()))??;

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(%transaction_id, %order_id, "payment refunded");
        Ok(refunded)
    }

    /// Refunds every active capture held against the order and closes it to
    /// further captures.
    ///
    /// Used when the caller cannot tell whether a capture landed: a capture
    /// still in flight is refused once this returns. Returns the refunded
    /// transactions; an order with no active capture yields none.
    #[tracing::instrument(skip(self))]
    pub async fn refund_order_captures(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        if order_id.is_blank() {
            return Err(DomainError::invalid_input("order_id must not be blank"));
        }

        let refunded = self
            .by_order
            .upsert(order_id.clone(), OrderPayments::default, |payments| {
                payments.closed = true;
                let mut refunded = Vec::new();
                for tx in payments
                    .transactions
                    .iter_mut()
                    .filter(|tx| tx.is_active_capture())
                {
                    tx.refunded = true;
                    refunded.push(tx.clone());
                }
                Ok::<_, DomainError>(refunded)
            })
            .await?;

        if !refunded.is_empty() {
            metrics::counter!("payments_refunded_total").increment(refunded.len() as u64);
        }
        tracing::info!(%order_id, refunded = refunded.len(), "order payments voided");
        Ok(refunded)
    }

    /// Returns the transaction with the given id.
    pub async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<PaymentTransaction, DomainError> {
        let order_id = self
            .by_transaction
            .read()
            .await
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.clone()))?;
        self.transactions_for_order(&order_id)
            .await
            .into_iter()
            .find(|tx| tx.transaction_id == *transaction_id)
            .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.clone()))
    }

    /// Returns every attempt recorded against the order, oldest first.
    pub async fn transactions_for_order(&self, order_id: &OrderId) -> Vec<PaymentTransaction> {
        self.by_order
            .get(order_id)
            .await
            .map(|payments| payments.transactions)
            .unwrap_or_default()
    }

    /// Returns the number of transactions recorded.
    pub async fn transaction_count(&self) -> usize {
        self.by_transaction.read().await.len()
    }
}
