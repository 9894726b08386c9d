//! RPC error envelope.

use std::fmt;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::ServiceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status codes carried in an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    Unavailable,
    DeadlineExceeded,
    Internal,
}

impl RpcCode {
    pub fn http_status(self) -> StatusCode {
        match self {
            RpcCode::NotFound => StatusCode::NOT_FOUND,
            RpcCode::InvalidArgument => StatusCode::BAD_REQUEST,
            RpcCode::FailedPrecondition => StatusCode::CONFLICT,
            RpcCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            RpcCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            RpcCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Best guess for a non-2xx reply whose body is not an error envelope,
    /// e.g. one produced by a proxy.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 415 | 422 => RpcCode::InvalidArgument,
            404 => RpcCode::NotFound,
            409 => RpcCode::FailedPrecondition,
            408 | 504 => RpcCode::DeadlineExceeded,
            502 | 503 => RpcCode::Unavailable,
            _ => RpcCode::Internal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::FailedPrecondition => "FAILED_PRECONDITION",
            RpcCode::Unavailable => "UNAVAILABLE",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reply body: `{"code": "NOT_FOUND", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, message)
    }
}

impl From<ServiceError> for RpcStatus {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(m) => Self::new(RpcCode::NotFound, m),
            ServiceError::InvalidInput(m) => Self::new(RpcCode::InvalidArgument, m),
            ServiceError::Conflict(m) => Self::new(RpcCode::FailedPrecondition, m),
            ServiceError::Unavailable(m) => Self::new(RpcCode::Unavailable, m),
            ServiceError::Timeout(m) => Self::new(RpcCode::DeadlineExceeded, m),
            ServiceError::Internal(m) => Self::new(RpcCode::Internal, m),
        }
    }
}

impl From<DomainError> for RpcStatus {
    fn from(err: DomainError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<RpcStatus> for ServiceError {
    fn from(status: RpcStatus) -> Self {
        let RpcStatus { code, message } = status;
        match code {
            RpcCode::NotFound => ServiceError::NotFound(message),
            RpcCode::InvalidArgument => ServiceError::InvalidInput(message),
            RpcCode::FailedPrecondition => ServiceError::Conflict(message),
            RpcCode::Unavailable => ServiceError::Unavailable(message),
            RpcCode::DeadlineExceeded => ServiceError::Timeout(message),
            RpcCode::Internal => ServiceError::Internal(message),
        }
    }
}

impl From<JsonRejection> for RpcStatus {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_argument(rejection.body_text())
    }
}

impl IntoResponse for RpcStatus {
    fn into_response(self) -> Response {
        if self.code == RpcCode::Internal {
            tracing::error!(error = %self.message, "internal error serving rpc");
        }
        (self.code.http_status(), Json(self)).into_response()
    }
}
