//! Shared types for the order-processing services.
//!
//! Identifiers, monetary amounts and the injectable id-generation capability
//! used by the ledger and the payment processor.

pub mod id_gen;
pub mod money;
pub mod types;

pub use id_gen::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use money::Money;
pub use types::{OrderId, ProductId, SagaId, TransactionId, UserId};
