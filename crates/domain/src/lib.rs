//! Leaf services of the order pipeline.
//!
//! This crate provides the three services that own state:
//! - `UserDirectory` for user lookup and email updates
//! - `OrderLedger` for order placement and status transitions
//! - `PaymentProcessor` for payment capture, decline and refund
//!
//! Each service keeps its records in an [`EntityStore`], which serializes
//! mutations per entity so concurrent requests never lose updates.

pub mod error;
pub mod order;
pub mod payment;
pub mod store;
pub mod user;

pub use error::{DomainError, ErrorKind};
pub use order::{Order, OrderError, OrderLedger, OrderStatus};
pub use payment::{DeclinePolicy, PaymentError, PaymentProcessor, PaymentTransaction};
pub use store::EntityStore;
pub use user::{User, UserDirectory};
