use std::{fmt::Display, future::Future, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db_types::{Money, StoreId};

/// Contract for the external payment gateway. The engine only ever initializes and verifies payments.
///
/// The returned futures are `Send` so that verification can run inside spawned background tasks.
pub trait PaymentGateway: Clone {
    /// Starts a payment attempt. On success the gateway hands back an opaque reference and a URL for the buyer.
    fn initialize(
        &self,
        store_id: &StoreId,
        request: PaymentRequest,
    ) -> impl Future<Output = Result<PaymentSession, GatewayError>> + Send;

    /// Asks the gateway for the current status of a payment attempt.
    fn verify(&self, store_id: &StoreId, reference: &str)
        -> impl Future<Output = Result<GatewayStatus, GatewayError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub currency: String,
    pub buyer_email: String,
    pub buyer_name: String,
    pub buyer_phone: Option<String>,
    pub description: String,
    pub metadata: Value,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Payment gateway error: {message}")]
pub struct GatewayError {
    pub message: String,
    pub details: Option<String>,
}

impl GatewayError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into(), details: None }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// A payment status as reported by the gateway (or by a trusted fallback caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Success,
    Captured,
    Paid,
    Failed,
    Cancelled,
    Declined,
    Pending,
    /// Anything the gateway reports that the engine does not act on (`abandoned`, `ongoing`, ...).
    Other(String),
}

/// How reconciliation treats a gateway status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Settled,
    Failed,
    Undetermined,
}

impl GatewayStatus {
    pub fn class(&self) -> StatusClass {
        match self {
            GatewayStatus::Success | GatewayStatus::Captured | GatewayStatus::Paid => StatusClass::Settled,
            GatewayStatus::Failed | GatewayStatus::Cancelled | GatewayStatus::Declined => StatusClass::Failed,
            GatewayStatus::Pending | GatewayStatus::Other(_) => StatusClass::Undetermined,
        }
    }
}

impl FromStr for GatewayStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" => Self::Success,
            "captured" => Self::Captured,
            "paid" => Self::Paid,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            "declined" => Self::Declined,
            "pending" => Self::Pending,
            other => Self::Other(other.to_string()),
        };
        Ok(status)
    }
}

impl From<&str> for GatewayStatus {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Success => write!(f, "success"),
            GatewayStatus::Captured => write!(f, "captured"),
            GatewayStatus::Paid => write!(f, "paid"),
            GatewayStatus::Failed => write!(f, "failed"),
            GatewayStatus::Cancelled => write!(f, "cancelled"),
            GatewayStatus::Declined => write!(f, "declined"),
            GatewayStatus::Pending => write!(f, "pending"),
            GatewayStatus::Other(s) => write!(f, "{s}"),
        }
    }
}
