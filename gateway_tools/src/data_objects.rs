use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_common::Money;

use crate::GatewayApiError;

/// Every gateway response is wrapped in this envelope. `status` is false when the gateway refused the request.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<T, GatewayApiError> {
        if !self.status {
            return Err(GatewayApiError::Rejected(self.message));
        }
        self.data.ok_or(GatewayApiError::EmptyResponse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitializeTransaction {
    pub email: String,
    /// In minor units.
    pub amount: Money,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionInitialized {
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionVerification {
    pub reference: String,
    /// The gateway's own status word (`success`, `failed`, `abandoned`, ...).
    pub status: String,
    pub amount: Option<Money>,
    pub currency: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
}
