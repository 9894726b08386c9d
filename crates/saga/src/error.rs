//! Saga error types.

use common::{OrderId, TransactionId, UserId};
use thiserror::Error;

use crate::services::ServiceError;

/// Ways an order placement can fail, as reported to the caller.
///
/// Only `Infrastructure` is worth retrying; every other variant is a final
/// answer for the request as submitted.
#[derive(Debug, Clone, Error)]
pub enum SagaError {
    /// The request is malformed or cannot be priced.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The user directory has no such user. Nothing was created.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The payment processor declined the payment; the order is `Failed`.
    #[error("Payment declined for order {order_id} (transaction {transaction_id})")]
    PaymentDeclined {
        order_id: OrderId,
        transaction_id: TransactionId,
    },

    /// The payment processor refused the request; the order is `Failed`.
    #[error("Payment rejected for order {order_id}: {reason}")]
    PaymentRejected { order_id: OrderId, reason: String },

    /// A service reported a state conflict.
    #[error("Conflict: {reason}")]
    Conflict {
        order_id: Option<OrderId>,
        reason: String,
    },

    /// A service could not be reached or did not answer in time.
    #[error("Step '{step}' failed: {reason}")]
    Infrastructure {
        step: &'static str,
        order_id: Option<OrderId>,
        reason: String,
    },

    /// A service answered in a way the saga cannot interpret.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SagaError {
    /// Maps a service failure at `step` to the caller-facing error.
    pub(crate) fn from_service(
        step: &'static str,
        order_id: Option<OrderId>,
        err: ServiceError,
    ) -> Self {
        match err {
            ServiceError::InvalidInput(message) => SagaError::InvalidInput(message),
            ServiceError::Conflict(reason) => SagaError::Conflict { order_id, reason },
            ServiceError::NotFound(message) => {
                SagaError::Internal(format!("{step}: unexpected not found: {message}"))
            }
            other => SagaError::Infrastructure {
                step,
                order_id,
                reason: other.to_string(),
            },
        }
    }

    /// Returns the order this failure left behind, if one was created.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            SagaError::PaymentDeclined { order_id, .. }
            | SagaError::PaymentRejected { order_id, .. } => Some(order_id),
            SagaError::Conflict { order_id, .. } | SagaError::Infrastructure { order_id, .. } => {
                order_id.as_ref()
            }
            SagaError::InvalidInput(_) | SagaError::UserNotFound(_) | SagaError::Internal(_) => {
                None
            }
        }
    }

    /// Returns true if submitting the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SagaError::Infrastructure { .. })
    }
}
