use thiserror::Error;

use crate::{
    db_types::{FulfillmentStatus, Money, OrderNumber, ProductId},
    inventory::{StockError, StockLevel},
    traits::{GatewayError, StorefrontDbError},
};

/// The error taxonomy surfaced by the order and payment APIs.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Insufficient {level} for product {product_id}. {available} available, {requested} requested")]
    InsufficientStock { product_id: ProductId, level: StockLevel, available: i64, requested: i64 },
    #[error("{0}")]
    SpecificationNotFound(String),
    #[error("Either a user id or a guest id (but not both) is required to place an order")]
    MissingIdentity,
    #[error("{0}")]
    PaymentGateway(#[from] GatewayError),
    #[error("Order {order_number} cannot be cancelled because it has been {status}")]
    CannotCancel { order_number: OrderNumber, status: FulfillmentStatus },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StockError> for OrderFlowError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::InvalidQuantity(_) => OrderFlowError::Validation(e.to_string()),
            StockError::InsufficientStock { product_id, level, available, requested } => {
                OrderFlowError::InsufficientStock { product_id, level, available, requested }
            },
            StockError::SpecificationNotFound { .. } => OrderFlowError::SpecificationNotFound(e.to_string()),
        }
    }
}

impl From<StorefrontDbError> for OrderFlowError {
    fn from(e: StorefrontDbError) -> Self {
        use StorefrontDbError::*;
        match e {
            Stock(e) => e.into(),
            StoreNotFound(_) |
            ProductNotFound(_) |
            CustomerNotFound(_) |
            DeliveryAreaNotFound(_) |
            AffiliateNotFound(_) |
            OrderNotFound(_) |
            ReferenceNotFound(_) => OrderFlowError::NotFound(e.to_string()),
            CannotCancel { order_number, status } => OrderFlowError::CannotCancel { order_number, status },
            InvalidStatusTransition { .. } |
            PaymentAlreadyStarted(_) |
            DuplicateReference(_) |
            InsufficientAffiliateBalance { .. } |
            InvalidData(_) => OrderFlowError::Validation(e.to_string()),
            DatabaseError(s) => OrderFlowError::Internal(s),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AffiliateError {
    #[error("Affiliate {0} does not exist")]
    NotFound(String),
    #[error("Payout amounts must be positive, but {0} was requested")]
    InvalidAmount(Money),
    #[error("Affiliate {affiliate_id} has a balance of {balance}, which cannot cover a payout of {amount}")]
    InsufficientBalance { affiliate_id: String, balance: Money, amount: Money },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<StorefrontDbError> for AffiliateError {
    fn from(e: StorefrontDbError) -> Self {
        match e {
            StorefrontDbError::AffiliateNotFound(id) => AffiliateError::NotFound(id),
            StorefrontDbError::InsufficientAffiliateBalance { affiliate_id, balance, amount } => {
                AffiliateError::InsufficientBalance { affiliate_id, balance, amount }
            },
            e => AffiliateError::DatabaseError(e.to_string()),
        }
    }
}
