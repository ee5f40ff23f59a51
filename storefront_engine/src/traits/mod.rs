//! #  Backend contracts
//!
//! This module defines the behaviour a database backend must expose to act as the storage layer of the storefront
//! engine, plus the contract for the external payment gateway.
//!
//! * [`StorefrontDatabase`] is the highest-level trait. It owns the order lifecycle: inserting orders, attaching
//!   payment references, and the compare-and-set transitions used by reconciliation and cancellation.
//! * [`InventoryManagement`] exposes product stock and the atomic decrement / restore operations.
//! * [`StoreDirectory`] resolves the store, buyer and delivery-area records an order is placed against.
//! * [`AffiliateManagement`] provides affiliate accounts and payouts.
//! * [`PaymentGateway`] is implemented by gateway adapters, not databases.
//!
//! Backends must make every multi-row change inside one method atomic. The APIs in [`crate::sfe_api`] rely on that.
mod affiliate_management;
mod data_objects;
mod inventory_management;
mod payment_gateway;
mod store_directory;
mod storefront_database;

pub use affiliate_management::AffiliateManagement;
pub use data_objects::{AbandonedOrder, AffiliateAccrualRecord, Cancellation, CancellationResult, PaymentTransition, RestoreReport};
pub use inventory_management::InventoryManagement;
pub use payment_gateway::{GatewayError, GatewayStatus, PaymentGateway, PaymentRequest, PaymentSession, StatusClass};
pub use store_directory::StoreDirectory;
pub use storefront_database::{StorefrontDatabase, StorefrontDbError};
