//! Service ports the orchestrator calls, with in-process adapters over the
//! leaf services.

pub mod fault;
pub mod order;
pub mod payment;
pub mod user;

pub use fault::{Fault, FaultInjector};
pub use order::OrderService;
pub use payment::{PaymentOutcome, PaymentService};
pub use user::UserService;

use domain::{DomainError, ErrorKind};
use thiserror::Error;

/// Method names shared by every transport of the service ports.
pub mod methods {
    pub const GET_USER: &str = "GetUser";
    pub const UPDATE_USER: &str = "UpdateUser";
    pub const PLACE_ORDER: &str = "PlaceOrder";
    pub const GET_ORDER: &str = "GetOrder";
    pub const MARK_PAYMENT_CAPTURED: &str = "MarkPaymentCaptured";
    pub const MARK_FAILED: &str = "MarkFailed";
    pub const CANCEL_ORDER: &str = "CancelOrder";
    pub const PROCESS_PAYMENT: &str = "ProcessPayment";
    pub const REFUND_PAYMENT: &str = "RefundPayment";
    pub const REFUND_ORDER_CAPTURES: &str = "RefundOrderCaptures";
}

/// Errors returned by a service port.
///
/// `NotFound`, `InvalidInput` and `Conflict` are business outcomes reported
/// by the service itself. The remaining variants mean the call did not
/// produce an answer and may be retried later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns true for transport and server failures as opposed to
    /// business outcomes.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable(_) | ServiceError::Timeout(_) | ServiceError::Internal(_)
        )
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidInput(message) => ServiceError::InvalidInput(message),
            other => match other.kind() {
                ErrorKind::NotFound => ServiceError::NotFound(other.to_string()),
                ErrorKind::InvalidInput => ServiceError::InvalidInput(other.to_string()),
                ErrorKind::Conflict => ServiceError::Conflict(other.to_string()),
            },
        }
    }
}
