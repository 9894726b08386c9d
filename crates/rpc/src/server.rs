//! axum routers serving the leaf services over RPC.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use saga::{OrderService, PaymentService, UserService};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::protocol::*;
use crate::status::RpcStatus;

type Payload<T> = Result<Json<T>, JsonRejection>;
type Reply<T> = Result<Json<T>, RpcStatus>;

fn served(method: &'static str) {
    metrics::counter!("rpc_requests_total", "method" => method).increment(1);
}

/// Routes for `ecommerce.UserService`.
pub fn user_router(users: Arc<dyn UserService>) -> Router {
    Router::new()
        .route(
            &method_path(USER_SERVICE, methods::GET_USER),
            post(get_user),
        )
        .route(
            &method_path(USER_SERVICE, methods::UPDATE_USER),
            post(update_user),
        )
        .with_state(users)
        .layer(TraceLayer::new_for_http())
}

/// Routes for `ecommerce.OrderService`.
pub fn order_router(orders: Arc<dyn OrderService>) -> Router {
    Router::new()
        .route(
            &method_path(ORDER_SERVICE, methods::PLACE_ORDER),
            post(place_order),
        )
        .route(
            &method_path(ORDER_SERVICE, methods::GET_ORDER),
            post(get_order),
        )
        .route(
            &method_path(ORDER_SERVICE, methods::MARK_PAYMENT_CAPTURED),
            post(mark_payment_captured),
        )
        .route(
            &method_path(ORDER_SERVICE, methods::MARK_FAILED),
            post(mark_failed),
        )
        .route(
            &method_path(ORDER_SERVICE, methods::CANCEL_ORDER),
            post(cancel_order),
        )
        .with_state(orders)
        .layer(TraceLayer::new_for_http())
}

/// Routes for `ecommerce.PaymentService`.
pub fn payment_router(payments: Arc<dyn PaymentService>) -> Router {
    Router::new()
        .route(
            &method_path(PAYMENT_SERVICE, methods::PROCESS_PAYMENT),
            post(process_payment),
        )
        .route(
            &method_path(PAYMENT_SERVICE, methods::REFUND_PAYMENT),
            post(refund_payment),
        )
        .route(
            &method_path(PAYMENT_SERVICE, methods::REFUND_ORDER_CAPTURES),
            post(refund_order_captures),
        )
        .with_state(payments)
        .layer(TraceLayer::new_for_http())
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "rpc server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

// -- UserService --

#[tracing::instrument(skip_all)]
async fn get_user(
    State(users): State<Arc<dyn UserService>>,
    payload: Payload<GetUserRequest>,
) -> Reply<GetUserReply> {
    served(methods::GET_USER);
    let Json(request) = payload?;
    tracing::debug!(user_id = %request.user_id, "GetUser");
    Ok(Json(users.get_user(request.user_id).await?))
}

#[tracing::instrument(skip_all)]
async fn update_user(
    State(users): State<Arc<dyn UserService>>,
    payload: Payload<UpdateUserRequest>,
) -> Reply<UpdateUserReply> {
    served(methods::UPDATE_USER);
    let Json(request) = payload?;
    let user = users
        .update_user(request.user_id, request.new_email)
        .await?;
    Ok(Json(UpdateUserReply { user }))
}

// -- OrderService --

#[tracing::instrument(skip_all)]
async fn place_order(
    State(orders): State<Arc<dyn OrderService>>,
    payload: Payload<PlaceOrderRequest>,
) -> Reply<PlaceOrderReply> {
    served(methods::PLACE_ORDER);
    let Json(request) = payload?;
    let order_id = orders
        .place_order(request.user_id, request.products)
        .await?;
    Ok(Json(PlaceOrderReply { order_id }))
}

#[tracing::instrument(skip_all)]
async fn get_order(
    State(orders): State<Arc<dyn OrderService>>,
    payload: Payload<OrderRequest>,
) -> Reply<OrderReply> {
    served(methods::GET_ORDER);
    let Json(request) = payload?;
    let order = orders.get_order(&request.order_id).await?;
    Ok(Json(OrderReply { order }))
}

#[tracing::instrument(skip_all)]
async fn mark_payment_captured(
    State(orders): State<Arc<dyn OrderService>>,
    payload: Payload<MarkPaymentCapturedRequest>,
) -> Reply<OrderReply> {
    served(methods::MARK_PAYMENT_CAPTURED);
    let Json(request) = payload?;
    let order = orders
        .mark_payment_captured(&request.order_id, &request.transaction_id)
        .await?;
    Ok(Json(OrderReply { order }))
}

#[tracing::instrument(skip_all)]
async fn mark_failed(
    State(orders): State<Arc<dyn OrderService>>,
    payload: Payload<MarkFailedRequest>,
) -> Reply<OrderReply> {
    served(methods::MARK_FAILED);
    let Json(request) = payload?;
    let order = orders
        .mark_failed(&request.order_id, &request.reason)
        .await?;
    Ok(Json(OrderReply { order }))
}

#[tracing::instrument(skip_all)]
async fn cancel_order(
    State(orders): State<Arc<dyn OrderService>>,
    payload: Payload<OrderRequest>,
) -> Reply<OrderReply> {
    served(methods::CANCEL_ORDER);
    let Json(request) = payload?;
    let order = orders.cancel_order(&request.order_id).await?;
    Ok(Json(OrderReply { order }))
}

// -- PaymentService --

#[tracing::instrument(skip_all)]
async fn process_payment(
    State(payments): State<Arc<dyn PaymentService>>,
    payload: Payload<ProcessPaymentRequest>,
) -> Reply<ProcessPaymentReply> {
    served(methods::PROCESS_PAYMENT);
    let Json(request) = payload?;
    let amount = request
        .amount()
        .ok_or_else(|| RpcStatus::invalid_argument("amount must be a finite number"))?;
    let outcome = payments
        .process_payment(&request.order_id, amount)
        .await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip_all)]
async fn refund_payment(
    State(payments): State<Arc<dyn PaymentService>>,
    payload: Payload<RefundPaymentRequest>,
) -> Reply<RefundPaymentReply> {
    served(methods::REFUND_PAYMENT);
    let Json(request) = payload?;
    payments.refund_payment(&request.transaction_id).await?;
    Ok(Json(RefundPaymentReply {
        transaction_id: request.transaction_id,
        refunded: true,
    }))
}

#[tracing::instrument(skip_all)]
async fn refund_order_captures(
    State(payments): State<Arc<dyn PaymentService>>,
    payload: Payload<RefundOrderCapturesRequest>,
) -> Reply<RefundOrderCapturesReply> {
    served(methods::REFUND_ORDER_CAPTURES);
    let Json(request) = payload?;
    let refunded_transaction_ids = payments.refund_order_captures(&request.order_id).await?;
    Ok(Json(RefundOrderCapturesReply {
        order_id: request.order_id,
        refunded_transaction_ids,
    }))
}
