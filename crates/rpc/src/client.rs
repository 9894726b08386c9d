//! reqwest clients implementing the service ports over RPC.

use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId, ProductId, TransactionId, UserId};
use domain::{Order, User};
use reqwest::{Client, Url};
use saga::{OrderService, PaymentOutcome, PaymentService, ServiceError, UserService};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::protocol::*;
use crate::status::{RpcCode, RpcStatus};

/// Errors raised while setting up a client. Call failures are reported as
/// [`ServiceError`].
#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("invalid service address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// A connection to one RPC server.
///
/// Every call is bounded by the channel timeout. Connection failures surface
/// as [`ServiceError::Unavailable`] and expired calls as
/// [`ServiceError::Timeout`].
#[derive(Debug, Clone)]
pub struct RpcChannel {
    client: Client,
    base: Url,
}

impl RpcChannel {
    /// Creates a channel to `addr`, e.g. `http://localhost:50051`.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, RpcClientError> {
        let base = Url::parse(addr).map_err(|e| RpcClientError::InvalidAddress {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(RpcClientError::InvalidAddress {
                addr: addr.to_string(),
                reason: "not a base URL".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Sends `request` to `service/method` and decodes the reply.
    #[tracing::instrument(skip(self, request), fields(server = %self.base))]
    pub async fn call<Req, Rep>(
        &self,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Rep, ServiceError>
    where
        Req: Serialize + Sync,
        Rep: DeserializeOwned,
    {
        let path = method_path(service, method);
        let url = self
            .base
            .join(&path)
            .map_err(|e| ServiceError::Internal(format!("bad method path {path}: {e}")))?;

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| map_transport_error(method, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(method, e))?;
        if !status.is_success() {
            let err = decode_status(status.as_u16(), &body);
            tracing::debug!(code = %err.code, message = %err.message, "rpc returned an error");
            return Err(err.into());
        }

        serde_json::from_slice(&body)
            .map_err(|e| ServiceError::Internal(format!("{method}: malformed reply: {e}")))
    }
}

fn map_transport_error(method: &str, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(format!("{method}: {err}"))
    } else {
        ServiceError::Unavailable(format!("{method}: {err}"))
    }
}

fn decode_status(status: u16, body: &[u8]) -> RpcStatus {
    serde_json::from_slice(body).unwrap_or_else(|_| {
        RpcStatus::new(
            RpcCode::from_http_status(status),
            String::from_utf8_lossy(body).into_owned(),
        )
    })
}

/// `ecommerce.UserService` client.
#[derive(Debug, Clone)]
pub struct UserServiceClient {
    channel: RpcChannel,
}

impl UserServiceClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, RpcClientError> {
        Ok(Self::new(RpcChannel::connect(addr, timeout)?))
    }
}

#[async_trait]
impl UserService for UserServiceClient {
    async fn get_user(&self, user_id: UserId) -> Result<User, ServiceError> {
        self.channel
            .call::<_, GetUserReply>(USER_SERVICE, methods::GET_USER, &GetUserRequest { user_id })
            .await
    }

    async fn update_user(&self, user_id: UserId, new_email: String) -> Result<User, ServiceError> {
        let reply: UpdateUserReply = self
            .channel
            .call(
                USER_SERVICE,
                methods::UPDATE_USER,
                &UpdateUserRequest { user_id, new_email },
            )
            .await?;
        Ok(reply.user)
    }
}

/// `ecommerce.OrderService` client.
#[derive(Debug, Clone)]
pub struct OrderServiceClient {
    channel: RpcChannel,
}

impl OrderServiceClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, RpcClientError> {
        Ok(Self::new(RpcChannel::connect(addr, timeout)?))
    }

    async fn order_call<Req>(&self, method: &str, request: &Req) -> Result<Order, ServiceError>
    where
        Req: Serialize + Sync,
    {
        let reply: OrderReply = self.channel.call(ORDER_SERVICE, method, request).await?;
        Ok(reply.order)
    }
}

#[async_trait]
impl OrderService for OrderServiceClient {
    async fn place_order(
        &self,
        user_id: UserId,
        products: Vec<ProductId>,
    ) -> Result<OrderId, ServiceError> {
        let reply: PlaceOrderReply = self
            .channel
            .call(
                ORDER_SERVICE,
                methods::PLACE_ORDER,
                &PlaceOrderRequest { user_id, products },
            )
            .await?;
        Ok(reply.order_id)
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        let request = OrderRequest {
            order_id: order_id.clone(),
        };
        self.order_call(methods::GET_ORDER, &request).await
    }

    async fn mark_payment_captured(
        &self,
        order_id: &OrderId,
        transaction_id: &TransactionId,
    ) -> Result<Order, ServiceError> {
        let request = MarkPaymentCapturedRequest {
            order_id: order_id.clone(),
            transaction_id: transaction_id.clone(),
        };
        self.order_call(methods::MARK_PAYMENT_CAPTURED, &request)
            .await
    }

    async fn mark_failed(&self, order_id: &OrderId, reason: &str) -> Result<Order, ServiceError> {
        let request = MarkFailedRequest {
            order_id: order_id.clone(),
            reason: reason.to_string(),
        };
        self.order_call(methods::MARK_FAILED, &request).await
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ServiceError> {
        let request = OrderRequest {
            order_id: order_id.clone(),
        };
        self.order_call(methods::CANCEL_ORDER, &request).await
    }
}

/// `ecommerce.PaymentService` client.
#[derive(Debug, Clone)]
pub struct PaymentServiceClient {
    channel: RpcChannel,
}

impl PaymentServiceClient {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }

    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, RpcClientError> {
        Ok(Self::new(RpcChannel::connect(addr, timeout)?))
    }
}

#[async_trait]
impl PaymentService for PaymentServiceClient {
    async fn process_payment(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentOutcome, ServiceError> {
        let reply: ProcessPaymentReply = self
            .channel
            .call(
                PAYMENT_SERVICE,
                methods::PROCESS_PAYMENT,
                &ProcessPaymentRequest::new(order_id.clone(), amount),
            )
            .await?;
        Ok(reply.into())
    }

    async fn refund_payment(&self, transaction_id: &TransactionId) -> Result<(), ServiceError> {
        let reply: RefundPaymentReply = self
            .channel
            .call(
                PAYMENT_SERVICE,
                methods::REFUND_PAYMENT,
                &RefundPaymentRequest {
                    transaction_id: transaction_id.clone(),
                },
            )
            .await?;
        if reply.refunded {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "refund of {} was not applied",
                reply.transaction_id
            )))
        }
    }

    async fn refund_order_captures(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<TransactionId>, ServiceError> {
        let reply: RefundOrderCapturesReply = self
            .channel
            .call(
                PAYMENT_SERVICE,
                methods::REFUND_ORDER_CAPTURES,
                &RefundOrderCapturesRequest {
                    order_id: order_id.clone(),
                },
            )
            .await?;
        Ok(reply.refunded_transaction_ids)
    }
}
