//! Saga orchestration for order placement.
//!
//! The order placement saga resolves the user, prices the products and then
//! follows these steps:
//! 1. Place the order
//! 2. Capture payment
//! 3. Confirm the capture on the order
//!
//! If a step after order creation fails, the order is marked failed and any
//! unconfirmed capture is refunded. Every saga is recorded as an append-only
//! event log and can be replayed into a [`SagaInstance`].
//!
//! The orchestrator reaches the leaf services only through the
//! [`UserService`], [`OrderService`] and [`PaymentService`] ports, so the
//! same saga runs in-process or across a network transport.

pub mod error;
pub mod events;
pub mod instance;
pub mod orchestrator;
pub mod order_placement;
pub mod pricing;
pub mod saga_log;
pub mod services;
pub mod state;

pub use error::SagaError;
pub use events::SagaEvent;
pub use instance::{CompensationFailure, SagaInstance};
pub use orchestrator::{DEFAULT_CALL_TIMEOUT, OrderOrchestrator, OrderPlacement};
pub use pricing::{DEFAULT_UNIT_PRICE, PriceList, PricingError};
pub use saga_log::{SagaLog, SagaLogEntry};
pub use services::{
    Fault, FaultInjector, OrderService, PaymentOutcome, PaymentService, ServiceError, UserService,
};
pub use state::SagaState;
