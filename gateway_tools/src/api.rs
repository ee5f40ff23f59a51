use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{ApiEnvelope, InitializeTransaction, TransactionInitialized, TransactionVerification},
    helpers::endpoint,
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = endpoint(&self.config.base_url, segments)?;
        trace!("🏦️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🏦️ REST query successful. {}", response.status());
            let envelope = response
                .json::<ApiEnvelope<T>>()
                .await
                .map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
            envelope.into_result()
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Starts a transaction. Payments for stores with a configured subaccount are routed to it.
    pub async fn initialize_transaction(
        &self,
        store_id: &str,
        mut request: InitializeTransaction,
    ) -> Result<TransactionInitialized, GatewayApiError> {
        if request.subaccount.is_none() {
            request.subaccount = self.config.subaccount_for(store_id).map(String::from);
        }
        debug!("🏦️ Initializing a {} {} transaction for store {store_id}", request.amount, request.currency);
        let result = self
            .rest_query::<TransactionInitialized, _>(Method::POST, &["transaction", "initialize"], Some(request))
            .await?;
        info!("🏦️ Transaction {} initialized for store {store_id}", result.reference);
        Ok(result)
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionVerification, GatewayApiError> {
        debug!("🏦️ Verifying transaction {reference}");
        let result = self
            .rest_query::<TransactionVerification, ()>(Method::GET, &["transaction", "verify", reference], None)
            .await?;
        debug!("🏦️ Transaction {reference} is {}", result.status);
        Ok(result)
    }
}
