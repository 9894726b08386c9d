//! Order placement, status and saga endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, SagaId, TransactionId, UserId};
use domain::{Order, OrderStatus};
use saga::{CompensationFailure, OrderService, SagaInstance, SagaState};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub const ORDER_PLACED_MESSAGE: &str = "Order placed and payment processed successfully";

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub products: Vec<ProductId>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedResponse {
    pub message: &'static str,
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub products: Vec<ProductId>,
    pub status: OrderStatus,
    pub transaction_id: Option<TransactionId>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            user_id: order.user_id,
            products: order.products,
            status: order.status,
            transaction_id: order.transaction_id,
            failure_reason: order.failure_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStatusResponse {
    pub saga_id: Option<SagaId>,
    pub saga_type: String,
    pub order_id: Option<OrderId>,
    pub state: SagaState,
    pub completed_steps: Vec<String>,
    pub compensated_steps: Vec<String>,
    pub compensation_failures: Vec<CompensationFailure>,
    pub amount_cents: Option<i64>,
    pub transaction_id: Option<TransactionId>,
    pub failure_reason: Option<String>,
    pub reconciled: bool,
    pub aborted: bool,
}

impl From<&SagaInstance> for SagaStatusResponse {
    fn from(saga: &SagaInstance) -> Self {
        Self {
            saga_id: saga.id(),
            saga_type: saga.saga_type().to_string(),
            order_id: saga.order_id().cloned(),
            state: saga.state(),
            completed_steps: saga.completed_steps().to_vec(),
            compensated_steps: saga.compensated_steps().to_vec(),
            compensation_failures: saga.compensation_failures().to_vec(),
            amount_cents: saga.amount().map(|amount| amount.cents()),
            transaction_id: saga
                .transaction_id()
                .or(saga.declined_transaction_id())
                .cloned(),
            failure_reason: saga.failure_reason().map(String::from),
            reconciled: saga.was_reconciled(),
            aborted: saga.is_aborted(),
        }
    }
}

// -- Handlers --

/// POST /order: run the order placement saga.
///
/// The saga runs on its own task, so a client that disconnects mid-request
/// does not leave a half-finished order behind.
#[tracing::instrument(skip(state, body))]
pub async fn place(
    State(state): State<AppState>,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<Json<OrderPlacedResponse>, ApiError> {
    let Json(request) = body?;
    let result = state
        .orchestrator
        .place_order_detached(request.user_id, request.products)
        .await;

    let outcome = match &result {
        Ok(_) => "placed",
        Err(err) if err.order_id().is_some() => "failed",
        Err(_) => "rejected",
    };
    metrics::counter!("gateway_orders_total", "outcome" => outcome).increment(1);

    let placement = result?;
    Ok(Json(OrderPlacedResponse {
        message: ORDER_PLACED_MESSAGE,
        order_id: placement.order_id,
        transaction_id: placement.transaction_id,
    }))
}

/// GET /order/{orderId}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orchestrator
        .orders()
        .get_order(&OrderId::new(order_id))
        .await?;
    Ok(Json(order.into()))
}

/// POST /order/{orderId}/cancel: close a failed order.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .orchestrator
        .orders()
        .cancel_order(&OrderId::new(order_id))
        .await?;
    tracing::info!(order_id = %order.order_id, "order cancelled");
    Ok(Json(order.into()))
}

/// GET /order/{orderId}/saga
#[tracing::instrument(skip(state))]
pub async fn saga_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let saga = state
        .orchestrator
        .saga_for_order(&OrderId::new(order_id.as_str()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No saga recorded for order {order_id}")))?;
    Ok(Json(SagaStatusResponse::from(&saga)))
}
