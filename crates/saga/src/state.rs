//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of an order placement saga.
///
/// State transitions:
/// ```text
/// Started ──► OrderCreated ──► PaymentAttempted ──┬──► Completed
///                 │                               └──► Compensating ──► Compensated
///                 └──────────────────────────────────► Compensating
/// ```
///
/// A saga that fails before the order exists stays in `Started`; nothing
/// needs compensating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// The request was accepted; no order exists yet.
    #[default]
    Started,

    /// The ledger recorded the order.
    OrderCreated,

    /// A payment capture was attempted.
    PaymentAttempted,

    /// The payment was captured and confirmed on the order (terminal state).
    Completed,

    /// A step failed and compensating actions are running.
    Compensating,

    /// Compensation finished after a failure (terminal state).
    Compensated,
}

impl SagaState {
    /// Returns true if the saga may move to `next`.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        matches!(
            (self, next),
            (SagaState::Started, SagaState::OrderCreated)
                | (SagaState::OrderCreated, SagaState::PaymentAttempted)
                | (SagaState::PaymentAttempted, SagaState::Completed)
                | (SagaState::OrderCreated, SagaState::Compensating)
                | (SagaState::PaymentAttempted, SagaState::Compensating)
                | (SagaState::Compensating, SagaState::Compensated)
        )
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_compensate(&self) -> bool {
        self.can_transition_to(SagaState::Compensating)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Compensated)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Started => "Started",
            SagaState::OrderCreated => "OrderCreated",
            SagaState::PaymentAttempted => "PaymentAttempted",
            SagaState::Completed => "Completed",
            SagaState::Compensating => "Compensating",
            SagaState::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
