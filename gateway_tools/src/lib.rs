//! A thin, typed client for the payment gateway's REST API.
//!
//! Only the two calls the storefront needs are covered: starting a transaction and verifying one. Every response
//! arrives wrapped in the gateway's `{status, message, data}` envelope, which [`ApiEnvelope`] unwraps.
mod api;
mod config;
mod data_objects;
mod error;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{ApiEnvelope, InitializeTransaction, TransactionInitialized, TransactionVerification};
pub use error::GatewayApiError;
