use std::fmt::Display;

use serde::{Deserialize, Serialize};
use storefront_engine::{
    db_types::{Order, OrderNumber},
    order_objects::PlaceOrderRequest,
    payment_objects::{PaymentInitialization, ReconcileOutcome},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializePaymentParams {
    pub order_number: OrderNumber,
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// The body of `POST /orders/{store_id}`. Set `initialize_payment` to start the payment in the same call.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderParams {
    #[serde(flatten)]
    pub order: PlaceOrderRequest,
    #[serde(default)]
    pub initialize_payment: bool,
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInitialization>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderParams {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub cancelled_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentParams {
    pub status: String,
}

/// The body of the manual payment fallback. The status defaults to `success`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderStatusParams {
    #[serde(default)]
    pub status: Option<String>,
}

/// The result of a verify, or of the manual fallback.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub message: String,
    pub should_continue_polling: bool,
    pub result: ReconcileOutcome,
}

impl From<ReconcileOutcome> for ReconcileResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        let success = !matches!(outcome, ReconcileOutcome::Cancelled { .. } | ReconcileOutcome::NotPayable { .. });
        Self {
            success,
            message: outcome.message(),
            should_continue_polling: outcome.should_continue_polling(),
            result: outcome,
        }
    }
}
