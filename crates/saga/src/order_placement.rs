//! Order placement saga constants.

/// The saga type identifier for order placement.
pub const SAGA_TYPE: &str = "OrderPlacement";

/// Step name: Resolve the user through the user directory.
pub const STEP_RESOLVE_USER: &str = "resolve_user";

/// Step name: Record the order in the ledger.
pub const STEP_PLACE_ORDER: &str = "place_order";

/// Step name: Capture payment for the order.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: Record the captured payment on the order.
pub const STEP_CONFIRM_ORDER: &str = "confirm_order";

/// Compensation step: Mark the order failed.
pub const STEP_MARK_ORDER_FAILED: &str = "mark_order_failed";

/// Compensation step: Refund a capture that could not be confirmed.
pub const STEP_REFUND_PAYMENT: &str = "refund_payment";
