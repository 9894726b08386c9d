//! Wire messages and method paths.
//!
//! Every method is a `POST` to `/<package>.<Service>/<Method>` carrying a
//! JSON request and answering with a JSON reply. Field names are fixed by the
//! protocol and must not be renamed.

use common::{Money, OrderId, ProductId, TransactionId, UserId};
use domain::{Order, User};
use saga::PaymentOutcome;
use serde::{Deserialize, Serialize};

pub use saga::services::methods;

pub const USER_SERVICE: &str = "ecommerce.UserService";
pub const ORDER_SERVICE: &str = "ecommerce.OrderService";
pub const PAYMENT_SERVICE: &str = "ecommerce.PaymentService";

/// Returns the HTTP path serving `method` of `service`.
pub fn method_path(service: &str, method: &str) -> String {
    format!("/{service}/{method}")
}

// -- UserService --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUserRequest {
    pub user_id: UserId,
}

/// The `GetUser` reply is the user record itself: `{user_id, name, email}`.
pub type GetUserReply = User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: UserId,
    pub new_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserReply {
    pub user: User,
}

// -- OrderService --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub products: Vec<ProductId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderReply {
    pub order_id: OrderId,
}

/// Request for `GetOrder` and `CancelOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaymentCapturedRequest {
    pub order_id: OrderId,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkFailedRequest {
    pub order_id: OrderId,
    pub reason: String,
}

/// Reply of every order method that returns the order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReply {
    pub order: Order,
}

// -- PaymentService --

/// `amount` travels in currency units (`100.5` is $100.50).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessPaymentRequest {
    pub order_id: OrderId,
    pub amount: f64,
}

impl ProcessPaymentRequest {
    pub fn new(order_id: OrderId, amount: Money) -> Self {
        Self {
            order_id,
            amount: amount.as_units(),
        }
    }

    /// The amount rounded to whole cents, or `None` when it is not a finite
    /// number.
    pub fn amount(&self) -> Option<Money> {
        Money::from_units(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPaymentReply {
    pub transaction_id: TransactionId,
    pub success: bool,
}

impl From<PaymentOutcome> for ProcessPaymentReply {
    fn from(outcome: PaymentOutcome) -> Self {
        Self {
            transaction_id: outcome.transaction_id,
            success: outcome.success,
        }
    }
}

impl From<ProcessPaymentReply> for PaymentOutcome {
    fn from(reply: ProcessPaymentReply) -> Self {
        Self {
            transaction_id: reply.transaction_id,
            success: reply.success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPaymentRequest {
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPaymentReply {
    pub transaction_id: TransactionId,
    pub refunded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrderCapturesRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrderCapturesReply {
    pub order_id: OrderId,
    /// Captures refunded by this call; empty when nothing was held.
    pub refunded_transaction_ids: Vec<TransactionId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_paths() {
        assert_eq!(
            method_path(USER_SERVICE, methods::GET_USER),
            "/ecommerce.UserService/GetUser"
        );
        assert_eq!(
            method_path(ORDER_SERVICE, methods::PLACE_ORDER),
            "/ecommerce.OrderService/PlaceOrder"
        );
        assert_eq!(
            method_path(PAYMENT_SERVICE, methods::PROCESS_PAYMENT),
            "/ecommerce.PaymentService/ProcessPayment"
        );
    }

    #[test]
    fn test_field_names_are_exact() {
        let user = serde_json::to_value(User::new(1, "Alice", "alice@example.com")).unwrap();
        assert_eq!(
            user,
            json!({"user_id": 1, "name": "Alice", "email": "alice@example.com"})
        );

        let update = serde_json::to_value(UpdateUserRequest {
            user_id: UserId::new(2),
            new_email: "bob@new.example".into(),
        })
        .unwrap();
        assert_eq!(update, json!({"user_id": 2, "new_email": "bob@new.example"}));

        let place = serde_json::to_value(PlaceOrderRequest {
            user_id: UserId::new(1),
            products: vec![ProductId::new("sku-7")],
        })
        .unwrap();
        assert_eq!(place, json!({"user_id": 1, "products": ["sku-7"]}));

        let reply = serde_json::to_value(ProcessPaymentReply {
            transaction_id: TransactionId::new("TXN-000001"),
            success: true,
        })
        .unwrap();
        assert_eq!(reply, json!({"transaction_id": "TXN-000001", "success": true}));

        let voided = serde_json::to_value(RefundOrderCapturesReply {
            order_id: OrderId::new("ORD-000001"),
            refunded_transaction_ids: vec![TransactionId::new("TXN-000001")],
        })
        .unwrap();
        assert_eq!(
            voided,
            json!({"order_id": "ORD-000001", "refunded_transaction_ids": ["TXN-000001"]})
        );
    }

    #[test]
    fn test_amount_travels_in_units() {
        let request =
            ProcessPaymentRequest::new(OrderId::new("ORD-000001"), Money::from_cents(10050));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"order_id": "ORD-000001", "amount": 100.5})
        );

        let decoded: ProcessPaymentRequest =
            serde_json::from_value(json!({"order_id": "ORD-000001", "amount": 19.99})).unwrap();
        assert_eq!(decoded.amount(), Some(Money::from_cents(1999)));
    }
}
