use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    affiliates::CommissionAccrual,
    db_types::{Money, Order, OrderNumber, ProductId, SelectedSpecification},
};

/// The outcome of a "set Paid if currently Unpaid" attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentTransition {
    /// This call moved the order to `Paid`. `accrual` is the commission credited as part of the same transaction.
    Transitioned { order: Order, accrual: Option<CommissionAccrual> },
    /// Someone else got there first. Nothing changed.
    AlreadyPaid(Order),
    /// The order can no longer be paid (it was cancelled). Nothing changed.
    NotPayable(Order),
}

impl PaymentTransition {
    pub fn order(&self) -> &Order {
        match self {
            PaymentTransition::Transitioned { order, .. } => order,
            PaymentTransition::AlreadyPaid(order) => order,
            PaymentTransition::NotPayable(order) => order,
        }
    }
}

/// Who cancelled an order, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: String,
    pub cancelled_at: DateTime<Utc>,
}

impl Cancellation {
    pub fn new<R: Into<String>, B: Into<String>>(reason: R, cancelled_by: B) -> Self {
        Self { reason: reason.into(), cancelled_by: cancelled_by.into(), cancelled_at: Utc::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationResult {
    pub order: Order,
    /// False if the order was already cancelled, in which case nothing was restored.
    pub changed: bool,
    pub restored: Vec<RestoreReport>,
    pub reversed_commission: Option<CommissionAccrual>,
}

/// What a restore actually credited back for one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub product_id: ProductId,
    pub quantity: i64,
    /// True if the product no longer exists, so nothing was credited.
    pub product_missing: bool,
    pub unmatched: Vec<SelectedSpecification>,
}

impl RestoreReport {
    pub fn missing_product(product_id: ProductId, quantity: i64) -> Self {
        Self { product_id, quantity, product_missing: true, unmatched: vec![] }
    }
}

/// An order removed because its payment could never start, with the stock it gave back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbandonedOrder {
    pub order: Order,
    pub restored: Vec<RestoreReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AffiliateAccrualRecord {
    pub id: i64,
    pub affiliate_id: String,
    pub order_number: OrderNumber,
    pub sales: Money,
    pub commission: Money,
    pub accrued_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversed_commission: Option<Money>,
}
