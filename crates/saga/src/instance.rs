//! Saga instance rebuilt from its event log.

use common::{Money, OrderId, ProductId, SagaId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::events::SagaEvent;
use crate::order_placement;
use crate::state::SagaState;

/// A compensation step that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationFailure {
    pub step_name: String,
    pub error: String,
}

/// An order placement saga, folded from its events.
///
/// Tracks the saga state, the completed steps and the context accumulated
/// along the way (order id, quoted amount, captured transaction).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaInstance {
    id: Option<SagaId>,
    saga_type: String,
    user_id: Option<UserId>,
    products: Vec<ProductId>,
    state: SagaState,
    current_step: usize,
    completed_steps: Vec<String>,
    order_id: Option<OrderId>,
    amount: Option<Money>,
    transaction_id: Option<TransactionId>,
    /// Transaction refused by the payment processor.
    declined_transaction_id: Option<TransactionId>,
    compensated_steps: Vec<String>,
    compensation_failures: Vec<CompensationFailure>,
    failure_reason: Option<String>,
    reconciled: bool,
    aborted: bool,
}

impl SagaInstance {
    /// Rebuilds a saga by applying `events` in order.
    pub fn replay(events: impl IntoIterator<Item = SagaEvent>) -> Self {
        let mut saga = Self::default();
        for event in events {
            saga.apply(event);
        }
        saga
    }

    /// Applies one event.
    pub fn apply(&mut self, event: SagaEvent) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.user_id = Some(data.user_id);
                self.products = data.products;
                self.saga_type = data.saga_type;
                self.state = SagaState::Started;
            }
            SagaEvent::StepStarted(_) => {
                self.current_step += 1;
            }
            SagaEvent::StepCompleted(data) => {
                if let Some(order_id) = data.order_id {
                    self.order_id = Some(order_id);
                }
                if let Some(amount) = data.amount {
                    self.amount = Some(amount);
                }
                if let Some(transaction_id) = data.transaction_id {
                    self.transaction_id = Some(transaction_id);
                }
                match data.step_name.as_str() {
                    order_placement::STEP_PLACE_ORDER => self.transition(SagaState::OrderCreated),
                    order_placement::STEP_PROCESS_PAYMENT => {
                        self.transition(SagaState::PaymentAttempted)
                    }
                    _ => {}
                }
                self.completed_steps.push(data.step_name);
            }
            SagaEvent::StepFailed(data) => {
                if data.step_name == order_placement::STEP_PROCESS_PAYMENT {
                    self.transition(SagaState::PaymentAttempted);
                }
                if let Some(transaction_id) = data.transaction_id {
                    self.declined_transaction_id = Some(transaction_id);
                }
                self.failure_reason = Some(data.error);
            }
            SagaEvent::ConfirmationReconciled(_) => {
                self.reconciled = true;
            }
            SagaEvent::CompensationStarted(_) => {
                self.transition(SagaState::Compensating);
            }
            SagaEvent::CompensationStepCompleted(data) => {
                self.compensated_steps.push(data.step_name);
            }
            SagaEvent::CompensationStepFailed(data) => {
                self.compensation_failures.push(CompensationFailure {
                    step_name: data.step_name,
                    error: data.error,
                });
            }
            SagaEvent::SagaCompleted => {
                self.transition(SagaState::Completed);
                self.failure_reason = None;
            }
            SagaEvent::SagaCompensated(data) => {
                self.transition(SagaState::Compensated);
                self.failure_reason = Some(data.reason);
            }
            SagaEvent::SagaAborted(data) => {
                self.aborted = true;
                self.failure_reason = Some(data.reason);
            }
        }
    }

    fn transition(&mut self, next: SagaState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            tracing::warn!(
                saga_id = ?self.id,
                from = %self.state,
                to = %next,
                "ignoring invalid saga transition"
            );
        }
    }
}

// Query methods
impl SagaInstance {
    /// Returns the saga ID, if started.
    pub fn id(&self) -> Option<SagaId> {
        self.id
    }

    /// Returns the saga type.
    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    /// Returns the saga state.
    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Returns the user the order is placed for.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the requested products.
    pub fn products(&self) -> &[ProductId] {
        &self.products
    }

    /// Returns the number of steps started so far.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Returns the list of completed step names.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the order ID, once the ledger recorded the order.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    /// Returns the quoted amount, once the order exists.
    pub fn amount(&self) -> Option<Money> {
        self.amount
    }

    /// Returns the captured transaction, if any.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    /// Returns the declined transaction, if the payment was refused.
    pub fn declined_transaction_id(&self) -> Option<&TransactionId> {
        self.declined_transaction_id.as_ref()
    }

    /// Returns the compensation steps that succeeded.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    /// Returns the compensation steps that failed.
    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        &self.compensation_failures
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns true if a lost confirmation was recovered by reading the
    /// order back.
    pub fn was_reconciled(&self) -> bool {
        self.reconciled
    }

    /// Returns true if the saga stopped before creating an order.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Returns true once no further events are expected.
    pub fn is_finished(&self) -> bool {
        self.aborted || self.state.is_terminal()
    }
}
