//! Shared application state and its two wirings.

use std::sync::Arc;

use domain::{OrderLedger, PaymentProcessor, UserDirectory};
use rpc::{OrderServiceClient, PaymentServiceClient, UserServiceClient};
use saga::OrderOrchestrator;

use crate::config::GatewayConfig;
use crate::error::StartupError;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: OrderOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: OrderOrchestrator) -> Self {
        Self { orchestrator }
    }
}

/// Leaf services running inside the gateway process.
#[derive(Clone)]
pub struct EmbeddedServices {
    pub users: UserDirectory,
    pub orders: OrderLedger,
    pub payments: PaymentProcessor,
}

impl EmbeddedServices {
    /// Seeded user directory, empty ledger, processor with the configured
    /// decline policy.
    pub async fn start(config: &GatewayConfig) -> Self {
        Self {
            users: UserDirectory::with_demo_users().await,
            orders: OrderLedger::new(),
            payments: PaymentProcessor::new().with_policy(config.decline_policy),
        }
    }

    pub fn orchestrator(&self, config: &GatewayConfig) -> OrderOrchestrator {
        OrderOrchestrator::new(
            Arc::new(self.users.clone()),
            Arc::new(self.orders.clone()),
            Arc::new(self.payments.clone()),
        )
        .with_price_list(config.prices.clone())
        .with_call_timeout(config.call_timeout)
    }
}

/// Orchestrator reaching the leaf services over RPC.
pub fn remote_orchestrator(config: &GatewayConfig) -> Result<OrderOrchestrator, StartupError> {
    let users = UserServiceClient::connect(&config.user_service_addr, config.call_timeout)?;
    let orders = OrderServiceClient::connect(&config.order_service_addr, config.call_timeout)?;
    let payments =
        PaymentServiceClient::connect(&config.payment_service_addr, config.call_timeout)?;

    Ok(OrderOrchestrator::new(Arc::new(users), Arc::new(orders), Arc::new(payments))
        .with_price_list(config.prices.clone())
        .with_call_timeout(config.call_timeout))
}

/// Builds the state `config` asks for.
pub async fn build_state(config: &GatewayConfig) -> Result<AppState, StartupError> {
    let orchestrator = if config.embedded_services {
        tracing::info!(policy = %config.decline_policy, "running leaf services in-process");
        EmbeddedServices::start(config).await.orchestrator(config)
    } else {
        tracing::info!(
            users = %config.user_service_addr,
            orders = %config.order_service_addr,
            payments = %config.payment_service_addr,
            "using remote leaf services"
        );
        remote_orchestrator(config)?
    };
    Ok(AppState::new(orchestrator))
}
