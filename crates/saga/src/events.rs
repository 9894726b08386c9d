//! Saga events.

use common::{Money, OrderId, ProductId, SagaId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

/// Events recorded while an order placement saga runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A saga step started execution.
    StepStarted(StepData),

    /// A saga step completed successfully.
    StepCompleted(StepCompletedData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// A confirmation that failed in transit was found applied on read-back.
    ConfirmationReconciled(ReconciledData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensation step completed successfully.
    CompensationStepCompleted(StepData),

    /// A compensation step failed (logged, compensation continues).
    CompensationStepFailed(StepFailedData),

    /// Saga completed successfully.
    SagaCompleted,

    /// Saga ended after compensation.
    SagaCompensated(ReasonData),

    /// Saga stopped before any order existed.
    SagaAborted(ReasonData),
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: SagaId,
    pub user_id: UserId,
    pub products: Vec<ProductId>,
    pub saga_type: String,
}

/// Data for events that only name a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub step_name: String,
}

/// Data for StepCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step_name: String,
    /// Order id (set after place_order).
    pub order_id: Option<OrderId>,
    /// Quoted amount (set after place_order).
    pub amount: Option<Money>,
    /// Captured transaction (set after process_payment).
    pub transaction_id: Option<TransactionId>,
}

/// Data for StepFailed and CompensationStepFailed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
    /// Declined transaction, when a payment was refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
}

/// Data for ConfirmationReconciled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledData {
    /// The transport error the confirmation originally reported.
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for events that end a saga with a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonData {
    pub reason: String,
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::ConfirmationReconciled(_) => "ConfirmationReconciled",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted => "SagaCompleted",
            SagaEvent::SagaCompensated(_) => "SagaCompensated",
            SagaEvent::SagaAborted(_) => "SagaAborted",
        }
    }

    /// Returns the order id this event introduces, if any.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            SagaEvent::StepCompleted(data) => data.order_id.as_ref(),
            _ => None,
        }
    }
}

// Convenience constructors
impl SagaEvent {
    /// Creates a SagaStarted event.
    pub fn saga_started(
        saga_id: SagaId,
        user_id: UserId,
        products: Vec<ProductId>,
        saga_type: impl Into<String>,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            user_id,
            products,
            saga_type: saga_type.into(),
        })
    }

    /// Creates a StepStarted event.
    pub fn step_started(step_name: impl Into<String>) -> Self {
        SagaEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a StepCompleted event carrying no context.
    pub fn step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            order_id: None,
            amount: None,
            transaction_id: None,
        })
    }

    /// Creates the StepCompleted event for a recorded order.
    pub fn order_created(step_name: impl Into<String>, order_id: OrderId, amount: Money) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            order_id: Some(order_id),
            amount: Some(amount),
            transaction_id: None,
        })
    }

    /// Creates the StepCompleted event for a captured payment.
    pub fn payment_captured(step_name: impl Into<String>, transaction_id: TransactionId) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step_name: step_name.into(),
            order_id: None,
            amount: None,
            transaction_id: Some(transaction_id),
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
            transaction_id: None,
        })
    }

    /// Creates the StepFailed event for a declined payment.
    pub fn payment_declined(step_name: impl Into<String>, transaction_id: TransactionId) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: format!("payment declined (transaction {transaction_id})"),
            transaction_id: Some(transaction_id),
        })
    }

    /// Creates a ConfirmationReconciled event.
    pub fn confirmation_reconciled(error: impl Into<String>) -> Self {
        SagaEvent::ConfirmationReconciled(ReconciledData {
            error: error.into(),
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationStepCompleted event.
    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CompensationStepFailed event.
    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
            transaction_id: None,
        })
    }

    /// Creates a SagaCompensated event.
    pub fn saga_compensated(reason: impl Into<String>) -> Self {
        SagaEvent::SagaCompensated(ReasonData {
            reason: reason.into(),
        })
    }

    /// Creates a SagaAborted event.
    pub fn saga_aborted(reason: impl Into<String>) -> Self {
        SagaEvent::SagaAborted(ReasonData {
            reason: reason.into(),
        })
    }
}
