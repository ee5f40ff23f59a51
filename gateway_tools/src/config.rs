use std::collections::HashMap;

use log::*;
use storefront_common::Secret;

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.paystack.co";

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Settlement subaccount per store. Stores without an entry settle to the main account.
    pub subaccounts: HashMap<String, String>,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SF_GATEWAY_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ SF_GATEWAY_BASE_URL not set, using {DEFAULT_GATEWAY_BASE_URL}");
            DEFAULT_GATEWAY_BASE_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("SF_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SF_GATEWAY_SECRET_KEY not set, using (probably useless) default");
            "sk_test_0000000000000000".to_string()
        }));
        let subaccounts = std::env::var("SF_GATEWAY_SUBACCOUNTS").map(|s| parse_subaccounts(&s)).unwrap_or_default();
        Self { base_url, secret_key, subaccounts }
    }

    pub fn subaccount_for(&self, store_id: &str) -> Option<&str> {
        self.subaccounts.get(store_id).map(String::as_str)
    }
}

/// Parses `store:subaccount` pairs separated by commas. Malformed pairs are logged and skipped.
pub fn parse_subaccounts(s: &str) -> HashMap<String, String> {
    s.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once(':') {
            Some((store, account)) if !store.trim().is_empty() && !account.trim().is_empty() => {
                Some((store.trim().to_string(), account.trim().to_string()))
            },
            _ => {
                warn!("🪛️ Ignoring malformed subaccount entry '{pair}'. Expected 'store:subaccount'");
                None
            },
        })
        .collect()
}
