//! Typed RPC boundary between the orchestrator and the leaf services.
//!
//! Each leaf service is exposed as JSON over HTTP `POST`, one path per
//! method (`/ecommerce.UserService/GetUser`, ...). [`server`] turns any
//! implementation of a service port into an axum router, and [`client`]
//! implements the same ports on top of reqwest, so the orchestrator runs
//! unchanged against in-process services or remote ones.

pub mod client;
pub mod protocol;
pub mod server;
pub mod status;

pub use client::{
    OrderServiceClient, PaymentServiceClient, RpcChannel, RpcClientError, UserServiceClient,
};
pub use server::{order_router, payment_router, serve, user_router};
pub use status::{RpcCode, RpcStatus};
