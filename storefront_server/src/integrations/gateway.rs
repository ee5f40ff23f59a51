//! The payment gateway adapter: the engine's [`PaymentGateway`] contract, spoken over the gateway's REST API.
use gateway_tools::{GatewayApi, GatewayApiError, InitializeTransaction};
use log::*;
use serde_json::Value;
use storefront_engine::{
    db_types::StoreId,
    traits::{GatewayError, GatewayStatus, PaymentGateway, PaymentRequest, PaymentSession},
};

#[derive(Clone)]
pub struct HttpPaymentGateway {
    api: GatewayApi,
}

impl HttpPaymentGateway {
    pub fn new(api: GatewayApi) -> Self {
        Self { api }
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn initialize(&self, store_id: &StoreId, request: PaymentRequest) -> Result<PaymentSession, GatewayError> {
        let transaction = new_transaction(request);
        let result = self.api.initialize_transaction(store_id.as_str(), transaction).await.map_err(|e| {
            warn!("🏦️ Could not initialize a transaction for store {store_id}. {e}");
            gateway_error("Could not start the payment", e)
        })?;
        Ok(PaymentSession { reference: result.reference, authorization_url: result.authorization_url })
    }

    async fn verify(&self, store_id: &StoreId, reference: &str) -> Result<GatewayStatus, GatewayError> {
        let result = self.api.verify_transaction(reference).await.map_err(|e| {
            debug!("🏦️ Could not verify transaction {reference} for store {store_id}. {e}");
            gateway_error("Could not verify the payment", e)
        })?;
        if result.reference != reference {
            warn!("🏦️ Asked to verify {reference}, but the gateway answered for {}", result.reference);
            return Err(GatewayError::new("The gateway answered for a different payment"));
        }
        Ok(GatewayStatus::from(result.status.as_str()))
    }
}

/// Buyer details the transaction body has no field for travel in the metadata.
fn new_transaction(request: PaymentRequest) -> InitializeTransaction {
    let mut metadata = match request.metadata {
        Value::Object(map) => map,
        Value::Null => Default::default(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("extra".into(), other);
            map
        },
    };
    metadata.insert("customer_name".into(), Value::String(request.buyer_name));
    if let Some(phone) = request.buyer_phone {
        metadata.insert("customer_phone".into(), Value::String(phone));
    }
    metadata.insert("description".into(), Value::String(request.description));
    InitializeTransaction {
        email: request.buyer_email,
        amount: request.amount,
        currency: request.currency,
        callback_url: request.callback_url,
        metadata: Value::Object(metadata),
        subaccount: None,
    }
}

fn gateway_error(message: &str, e: GatewayApiError) -> GatewayError {
    GatewayError::new(message).with_details(e.to_string())
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use storefront_common::Money;

    use super::*;

    #[test]
    fn buyer_details_go_into_metadata() {
        let request = PaymentRequest {
            amount: Money::from(4_300),
            currency: "NGN".into(),
            buyer_email: "ada@example.com".into(),
            buyer_name: "Ada".into(),
            buyer_phone: Some("+2348000000000".into()),
            description: "Order ORD-20240101-ABC123 from Tees".into(),
            metadata: json!({"order_number": "ORD-20240101-ABC123"}),
            callback_url: Some("https://shop.example.com/thanks".into()),
        };
        let tx = new_transaction(request);
        assert_eq!(tx.email, "ada@example.com");
        assert_eq!(tx.amount, Money::from(4_300));
        assert_eq!(tx.metadata["order_number"], "ORD-20240101-ABC123");
        assert_eq!(tx.metadata["customer_name"], "Ada");
        assert_eq!(tx.metadata["customer_phone"], "+2348000000000");
        assert_eq!(tx.callback_url.as_deref(), Some("https://shop.example.com/thanks"));
        assert!(tx.subaccount.is_none());
    }
}
