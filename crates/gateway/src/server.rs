//! Entry points shared by the binaries.

use std::sync::Arc;

use axum::Router;
use domain::{OrderLedger, PaymentProcessor, UserDirectory};
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::{GatewayConfig, LeafService, ServiceConfig};
use crate::error::StartupError;
use crate::state::build_state;
use crate::{create_app, ops_router, telemetry};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Runs the gateway until a shutdown signal arrives.
pub async fn run_gateway() -> Result<(), StartupError> {
    let config = GatewayConfig::from_env()?;
    telemetry::init_tracing(&config.log)?;
    let metrics_handle = telemetry::install_metrics_recorder()?;

    let state = build_state(&config).await?;
    let app = create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting gateway");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway shut down gracefully");
    Ok(())
}

/// Runs one leaf service over RPC until a shutdown signal arrives.
pub async fn run_leaf_server(service: LeafService) -> Result<(), StartupError> {
    let config = ServiceConfig::from_env(service)?;
    telemetry::init_tracing(&config.log)?;
    let metrics_handle = telemetry::install_metrics_recorder()?;

    let app = leaf_router(&config)
        .await
        .merge(ops_router(metrics_handle));

    let addr = config.addr();
    tracing::info!(service = service.name(), %addr, "starting leaf service");
    let listener = TcpListener::bind(&addr).await?;
    rpc::serve(listener, app, shutdown_signal()).await?;

    tracing::info!(service = service.name(), "leaf service shut down gracefully");
    Ok(())
}

async fn leaf_router(config: &ServiceConfig) -> Router {
    match config.service {
        LeafService::User => rpc::user_router(Arc::new(UserDirectory::with_demo_users().await)),
        LeafService::Order => rpc::order_router(Arc::new(OrderLedger::new())),
        LeafService::Payment => {
            tracing::info!(policy = %config.decline_policy, "payment decline policy");
            rpc::payment_router(Arc::new(
                PaymentProcessor::new().with_policy(config.decline_policy),
            ))
        }
    }
}
