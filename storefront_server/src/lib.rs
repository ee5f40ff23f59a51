//! # Storefront server
//! This crate hosts the HTTP server for the storefront engine. It is responsible for:
//! * Accepting orders and starting their payments with the gateway.
//! * Receiving the gateway's webhooks (behind an HMAC signature check and an optional IP whitelist).
//! * Polling the gateway in the background for payments that have not settled yet.
//! * Exposing payment status, client polling, order lookup, cancellation and affiliate accounts.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /orders/{store_id}`, `GET /orders/{store_id}/{order_number}`,
//!   `POST /orders/{store_id}/{order_number}/cancel`, `PATCH /orders/{store_id}/{order_number}/fulfillment`
//! * `POST /payments/{store_id}/initialize`, `GET /payments/{store_id}/verify/{reference}`,
//!   `GET /payments/{store_id}/status/{reference}`, `GET /payments/{store_id}/poll/{reference}`,
//!   `POST /payments/{store_id}/webhook`
//! * `PATCH /payments/{store_id}/update-order-status/{reference}`: the manual fallback, only if enabled.
//! * `GET /affiliates/{store_id}/{affiliate_id}`

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod poll_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
