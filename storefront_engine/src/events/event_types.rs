use serde::{Deserialize, Serialize};

use crate::{affiliates::CommissionAccrual, db_types::Order};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order: Order,
}

impl OrderPlacedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted exactly once per order, by whichever path won the `Unpaid` to `Paid` transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub accrual: Option<CommissionAccrual>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, accrual: Option<CommissionAccrual>) -> Self {
        Self { order, accrual }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        let reason = order.cancellation_reason.clone().unwrap_or_default();
        Self { order, reason }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    OrderPlaced(OrderPlacedEvent),
    OrderPaid(OrderPaidEvent),
    OrderCancelled(OrderCancelledEvent),
}
