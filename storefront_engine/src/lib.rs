//! Storefront engine
//!
//! The storefront engine is the order-processing core shared by many independent storefronts. It places orders
//! against a two-level inventory ledger, starts payments with an external gateway, and reconciles the gateway's
//! answers into one consistent order state.
//!
//! The library is divided into a few main sections:
//! 1. The rules ([`mod@inventory`], [`mod@pricing`], [`mod@affiliates`]). These are pure and backend-agnostic.
//! 2. The backend contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). Every multi-row change a
//!    backend makes is atomic, and every status change is a compare-and-set, so concurrent requests for the same
//!    order or product cannot corrupt the ledger or pay an order twice.
//! 3. The public API ([`mod@sfe_api`]): [`OrderFlowApi`], [`PaymentFlowApi`], [`InventoryApi`] and
//!    [`AffiliateApi`].
//!
//! The engine also publishes events when orders are placed, paid or cancelled. See [`mod@events`].
pub mod affiliates;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod inventory;
pub mod pricing;
mod sfe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use events::EventProducers;
pub use sfe_api::{
    affiliate_api::AffiliateApi,
    errors::{AffiliateError, OrderFlowError},
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::{PaymentFlowApi, GATEWAY_CANCELLER},
    payment_objects,
};
