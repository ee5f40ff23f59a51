use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{FulfillmentStatus, Money, NewOrder, Order, OrderNumber, ProductId, StoreId},
    inventory::StockError,
    sfe_api::order_objects::OrderQueryFilter,
    traits::{
        AbandonedOrder,
        AffiliateManagement,
        Cancellation,
        CancellationResult,
        InventoryManagement,
        PaymentTransition,
        StoreDirectory,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the storefront engine.
///
/// This behaviour includes:
/// * Persisting newly placed orders and their line items
/// * Attaching gateway payment references to orders
/// * The atomic payment transition (with commission accrual)
/// * Cancellation with stock restoration, and the compensating delete for orders whose payment never started
#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase: Clone + InventoryManagement + StoreDirectory + AffiliateManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order in `Unpaid`/`Pending`, with its line items, in a single transaction.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorefrontDbError>;

    async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, StorefrontDbError>;

    /// Payment references are unique per store.
    async fn fetch_order_by_reference(
        &self,
        store_id: &StoreId,
        reference: &str,
    ) -> Result<Option<Order>, StorefrontDbError>;

    /// Fetches orders matching the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorefrontDbError>;

    /// Records the gateway reference and authorization URL for an order that is still awaiting its first payment
    /// attempt. Fails with `PaymentAlreadyStarted` if the order already has a reference.
    async fn attach_payment_reference(
        &self,
        order_number: &OrderNumber,
        reference: &str,
        authorization_url: &str,
    ) -> Result<Order, StorefrontDbError>;

    /// Compensating action for a failed payment initialization. In one transaction, deletes the order (only if it is
    /// `Unpaid`, `Pending` and has no payment reference) and restores the stock every line item took.
    async fn abandon_order(&self, order_number: &OrderNumber) -> Result<AbandonedOrder, StorefrontDbError>;

    /// Sets `Paid`/`Processing`/`paid_at` if, and only if, the order is currently `Unpaid` and `Pending`. The affiliate
    /// commission, if any, is accrued in the same transaction. Repeated or concurrent calls transition exactly once.
    async fn mark_order_paid(
        &self,
        store_id: &StoreId,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<PaymentTransition, StorefrontDbError>;

    /// Cancels an order and restores its stock in one transaction. Shipped and delivered orders cannot be cancelled.
    /// Cancelling a cancelled order changes nothing. If the order was paid, its accrued commission is reversed.
    async fn cancel_order(
        &self,
        order_number: &OrderNumber,
        cancellation: Cancellation,
    ) -> Result<CancellationResult, StorefrontDbError>;

    /// Cancels the order behind a payment reference after the gateway reported a failure. Only orders that are still
    /// `Unpaid` and `Pending` are affected; for anything else the current order is returned unchanged.
    async fn cancel_unpaid_order_for_reference(
        &self,
        store_id: &StoreId,
        reference: &str,
        cancellation: Cancellation,
    ) -> Result<CancellationResult, StorefrontDbError>;

    /// Administrative fulfilment progression, as a compare-and-set on the current status.
    async fn update_fulfillment_status(
        &self,
        order_number: &OrderNumber,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    ) -> Result<Order, StorefrontDbError>;
}

#[derive(Debug, Clone, Error)]
pub enum StorefrontDbError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Store {0} does not exist")]
    StoreNotFound(StoreId),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Customer {0} does not exist")]
    CustomerNotFound(String),
    #[error("Delivery area {0} does not exist")]
    DeliveryAreaNotFound(String),
    #[error("Affiliate {0} does not exist")]
    AffiliateNotFound(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("No order has the payment reference {0}")]
    ReferenceNotFound(String),
    #[error("{0}")]
    Stock(#[from] StockError),
    #[error("Order {order_number} cannot be cancelled because it has been {status}")]
    CannotCancel { order_number: OrderNumber, status: FulfillmentStatus },
    #[error("Order {order_number} cannot move from {from} to {to}")]
    InvalidStatusTransition { order_number: OrderNumber, from: FulfillmentStatus, to: FulfillmentStatus },
    #[error("A payment has already been started for order {0}")]
    PaymentAlreadyStarted(OrderNumber),
    #[error("Payment reference {0} is already assigned to another order")]
    DuplicateReference(String),
    #[error("Affiliate {affiliate_id} has a balance of {balance}, which cannot cover a payout of {amount}")]
    InsufficientAffiliateBalance { affiliate_id: String, balance: Money, amount: Money },
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StorefrontDbError {
    fn from(e: sqlx::Error) -> Self {
        StorefrontDbError::DatabaseError(e.to_string())
    }
}
