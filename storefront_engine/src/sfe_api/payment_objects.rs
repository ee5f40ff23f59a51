use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    affiliates::CommissionAccrual,
    db_types::{FulfillmentStatus, Money, Order, OrderNumber, PaymentStatus},
    traits::GatewayStatus,
};

/// The result of feeding one gateway signal through the payment transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This signal moved the order to `Paid`.
    Paid { order: Order, accrual: Option<CommissionAccrual> },
    /// The order was already paid. Nothing changed and no commission was accrued.
    AlreadyPaid { order: Order },
    /// A failure signal cancelled the order and returned its stock.
    Cancelled { order: Order },
    AlreadyCancelled { order: Order },
    /// The gateway has not settled the payment either way.
    Pending { order: Order, gateway_status: String },
    /// A success signal arrived for an order that can no longer be paid (it was cancelled first).
    NotPayable { order: Order },
}

impl ReconcileOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ReconcileOutcome::Paid { order, .. } |
            ReconcileOutcome::AlreadyPaid { order } |
            ReconcileOutcome::Cancelled { order } |
            ReconcileOutcome::AlreadyCancelled { order } |
            ReconcileOutcome::Pending { order, .. } |
            ReconcileOutcome::NotPayable { order } => order,
        }
    }

    /// Only an undetermined payment is worth checking again.
    pub fn should_continue_polling(&self) -> bool {
        matches!(self, ReconcileOutcome::Pending { .. })
    }

    pub fn message(&self) -> String {
        let n = &self.order().order_number;
        match self {
            ReconcileOutcome::Paid { .. } => format!("Payment confirmed. Order {n} is now being processed."),
            ReconcileOutcome::AlreadyPaid { .. } => format!("Order {n} is already paid."),
            ReconcileOutcome::Cancelled { .. } => format!("Payment failed. Order {n} has been cancelled."),
            ReconcileOutcome::AlreadyCancelled { .. } => format!("Order {n} has already been cancelled."),
            ReconcileOutcome::Pending { gateway_status, .. } => {
                format!("Payment for order {n} is still {gateway_status}.")
            },
            ReconcileOutcome::NotPayable { order } => {
                format!("Order {n} is {} and can no longer be paid.", order.fulfillment_status)
            },
        }
    }
}

/// What a single poll reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub reference: String,
    pub should_continue_polling: bool,
    pub message: String,
    pub order_number: Option<OrderNumber>,
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
}

impl PollOutcome {
    pub fn from_outcome(reference: &str, outcome: &ReconcileOutcome) -> Self {
        let order = outcome.order();
        Self {
            reference: reference.to_string(),
            should_continue_polling: outcome.should_continue_polling(),
            message: outcome.message(),
            order_number: Some(order.order_number.clone()),
            payment_status: Some(order.payment_status),
            fulfillment_status: Some(order.fulfillment_status),
        }
    }

    /// A poll that could not reach a verdict. The caller should try again later.
    pub fn retry_later(reference: &str, order: &Order, reason: String) -> Self {
        Self {
            reference: reference.to_string(),
            should_continue_polling: true,
            message: reason,
            order_number: Some(order.order_number.clone()),
            payment_status: Some(order.payment_status),
            fulfillment_status: Some(order.fulfillment_status),
        }
    }
}

/// The stored payment state for a reference, read without contacting the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusReport {
    pub order_number: OrderNumber,
    pub reference: String,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub total: Money,
    pub currency: String,
    pub authorization_url: Option<String>,
}

impl PaymentStatusReport {
    pub fn new(reference: &str, order: &Order) -> Self {
        Self {
            order_number: order.order_number.clone(),
            reference: reference.to_string(),
            payment_status: order.payment_status,
            fulfillment_status: order.fulfillment_status,
            paid_at: order.paid_at,
            total: order.pricing.total,
            currency: order.store.currency.clone(),
            authorization_url: order.authorization_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInitialization {
    pub order_number: OrderNumber,
    pub reference: String,
    pub authorization_url: String,
    /// True if the order already had a payment attempt, which is returned instead of starting a new one.
    pub already_initialized: bool,
}

/// The fields of a gateway webhook that reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub event: Option<String>,
    pub reference: String,
    /// `None` if the payload carries no usable status, in which case the gateway must be asked.
    pub status: Option<GatewayStatus>,
}

impl WebhookNotification {
    /// Extracts the reference from `data.reference`, or a top-level `reference`. The status comes from `data.status`
    /// if present, else from the suffix of the event name (`charge.success` gives `success`).
    pub fn from_value(payload: &Value) -> Option<Self> {
        let data = payload.get("data");
        let reference = data
            .and_then(|d| d.get("reference"))
            .or_else(|| payload.get("reference"))
            .and_then(value_as_string)
            .filter(|s| !s.is_empty())?;
        let event = payload.get("event").and_then(Value::as_str).map(str::to_string);
        let status = data
            .and_then(|d| d.get("status"))
            .and_then(Value::as_str)
            .or_else(|| event.as_deref().and_then(|e| e.rsplit('.').next()))
            .map(GatewayStatus::from)
            .filter(|s| !matches!(s, GatewayStatus::Other(o) if o.is_empty()));
        Some(Self { event, reference, status })
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
