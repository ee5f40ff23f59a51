//! Affiliate commission rules.
//!
//! Commission is earned on `subtotal - discount` (delivery and tax are excluded) at the affiliate's commission
//! percentage. It accrues exactly once, when the order's payment moves from `Unpaid` to `Paid`, and is reversed if a
//! paid order is later cancelled.
use serde::{Deserialize, Serialize};

use crate::db_types::{Money, PricingBreakdown};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionAccrual {
    /// The sales amount credited to the affiliate.
    pub sales: Money,
    pub commission: Money,
}

impl CommissionAccrual {
    pub fn for_order(pricing: &PricingBreakdown, commission_percent: f64) -> Self {
        Self::for_sales(pricing.commissionable(), commission_percent)
    }

    pub fn for_sales(sales: Money, commission_percent: f64) -> Self {
        let sales = sales.max(Money::zero());
        let pct = if commission_percent.is_finite() { commission_percent.clamp(0.0, 100.0) } else { 0.0 };
        Self { sales, commission: sales.percent(pct) }
    }

    /// The reversal of this accrual, limited to what the affiliate still holds. Commission that has already been paid
    /// out cannot be clawed back here, and `balance` must never go negative.
    pub fn reversal(&self, balance: Money) -> Self {
        Self { sales: self.sales, commission: self.commission.min(balance.max(Money::zero())) }
    }
}
