//! Domain error types.

use common::{OrderId, TransactionId, UserId};
use thiserror::Error;

use crate::order::OrderError;
use crate::payment::PaymentError;

/// Errors that can occur during leaf service operations.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// No user record has this id.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// No order record has this id.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No payment transaction has this id.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The request is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error occurred in the order lifecycle.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred while processing a payment.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Coarse classification shared by every layer above the leaf services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// The request was malformed.
    InvalidInput,
    /// The request conflicts with the entity's current state.
    Conflict,
}

impl DomainError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        DomainError::InvalidInput(message.into())
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::UserNotFound(_)
            | DomainError::OrderNotFound(_)
            | DomainError::TransactionNotFound(_) => ErrorKind::NotFound,
            DomainError::InvalidInput(_) => ErrorKind::InvalidInput,
            DomainError::Order(_) | DomainError::Payment(_) => ErrorKind::Conflict,
        }
    }
}
