//! # Storefront engine public API
//!
//! The `sfe_api` module exposes the programmatic API of the storefront engine. Each API is created by supplying a
//! backend that implements the traits it needs, so callers can pick only the functionality they use.
//!
//! * [`order_flow_api`] places orders and handles cancellation and fulfilment.
//! * [`payment_flow_api`] starts payments with the gateway and reconciles webhook, poll and fallback signals.
//! * [`inventory_api`] gives direct access to the stock ledger.
//! * [`affiliate_api`] exposes affiliate accounts and payouts.
//!
//! ```rust,ignore
//! use storefront_engine::{EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.place_order(&store_id, request).await?;
//! ```
pub mod affiliate_api;
pub mod errors;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod payment_objects;
