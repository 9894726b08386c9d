//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::OrderId;
use rpc::RpcClientError;
use saga::{SagaError, ServiceError};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path or body.
    BadRequest(String),
    /// A leaf service call failed.
    Service(ServiceError),
    /// The order placement saga failed.
    Saga(SagaError),
    /// Resource not found outside a service call, e.g. an unknown saga.
    NotFound(String),
}

/// Error body: `{"error": "...", "orderId": "...", "retryable": false}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub retryable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Service(err) => service_status(err),
            ApiError::Saga(err) => saga_status(err),
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => ErrorBody {
                error: msg.clone(),
                order_id: None,
                retryable: false,
            },
            ApiError::Service(err) => ErrorBody {
                error: err.to_string(),
                order_id: None,
                retryable: err.is_infrastructure(),
            },
            ApiError::Saga(err) => ErrorBody {
                error: err.to_string(),
                order_id: err.order_id().cloned(),
                retryable: err.is_retryable(),
            },
        }
    }
}

fn service_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Unavailable(_) | ServiceError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SagaError::UserNotFound(_) => StatusCode::NOT_FOUND,
        SagaError::PaymentDeclined { .. } | SagaError::PaymentRejected { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        SagaError::Conflict { .. } => StatusCode::CONFLICT,
        SagaError::Infrastructure { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        if status.is_server_error() {
            tracing::error!(%status, error = %body.error, "request failed");
        } else {
            tracing::debug!(%status, error = %body.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Failures that stop a binary from starting or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("telemetry setup failed: {0}")]
    Telemetry(String),

    #[error("cannot create service client: {0}")]
    Client(#[from] RpcClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
