//! # Pricing
//!
//! Prices are worked out once, when an order is placed, and frozen into the order as a [`PricingBreakdown`].
//!
//! Unit prices follow one of three rules. A verified wholesaler pays the product's wholesaler price (or the list price
//! less their tier discount when the product has no wholesaler price). Otherwise a product on sale is sold at its sale
//! percentage off. Otherwise the list price applies. Wholesaler and sale pricing never stack.
use serde::{Deserialize, Serialize};

use crate::db_types::{Money, PriceRule, PricingBreakdown, Product};

/// An order-level discount, either a percentage of the subtotal or a flat amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDiscount {
    Percent(f64),
    Flat(Money),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WholesalerTier {
    pub discount_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingContext {
    /// Set only for verified wholesalers.
    pub wholesaler: Option<WholesalerTier>,
    pub order_discount: Option<OrderDiscount>,
    pub delivery_cost: Money,
    pub tax_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedItem {
    pub unit_price: Money,
    pub price_rule: PriceRule,
    pub line_total: Money,
}

#[derive(Debug, Clone, Default)]
pub struct PricingCalculator {
    context: PricingContext,
}

fn clamp_percent(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

impl PricingCalculator {
    pub fn new(context: PricingContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &PricingContext {
        &self.context
    }

    pub fn unit_price(&self, product: &Product) -> (Money, PriceRule) {
        if let Some(tier) = &self.context.wholesaler {
            if let Some(price) = product.wholesaler_price {
                return (price, PriceRule::Wholesaler);
            }
            let pct = clamp_percent(tier.discount_percent);
            if pct > 0.0 {
                return (product.price.less_percent(pct), PriceRule::Wholesaler);
            }
        }
        match product.sale_percentage.map(clamp_percent) {
            Some(pct) if product.is_on_sale && pct > 0.0 => (product.price.less_percent(pct), PriceRule::Sale),
            _ => (product.price, PriceRule::List),
        }
    }

    pub fn price_item(&self, product: &Product, quantity: i64) -> PricedItem {
        let (unit_price, price_rule) = self.unit_price(product);
        PricedItem { unit_price, price_rule, line_total: unit_price * quantity }
    }

    /// Totals for the order. The discount is capped at the subtotal, so the total is never negative.
    pub fn breakdown<I: IntoIterator<Item = Money>>(&self, line_totals: I) -> PricingBreakdown {
        let subtotal: Money = line_totals.into_iter().sum();
        let discount = match self.context.order_discount {
            Some(OrderDiscount::Percent(p)) => subtotal.percent(clamp_percent(p)),
            Some(OrderDiscount::Flat(amount)) => amount.max(Money::zero()),
            None => Money::zero(),
        }
        .min(subtotal);
        let shipping = self.context.delivery_cost.max(Money::zero());
        let tax = (subtotal - discount).percent(clamp_percent(self.context.tax_percent));
        let total = subtotal + shipping + tax - discount;
        PricingBreakdown { subtotal, discount, shipping, tax, total }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::{ProductId, StoreId};

    fn product(price: i64) -> Product {
        Product {
            id: ProductId::from("p"),
            store_id: StoreId::from("s"),
            name: "Widget".into(),
            image_url: None,
            price: Money::from(price),
            sale_percentage: None,
            is_on_sale: false,
            wholesaler_price: None,
            is_active: true,
            general_quantity: 10,
            sold_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn list_price() {
        let calc = PricingCalculator::default();
        let item = calc.price_item(&product(1000), 3);
        assert_eq!(item.unit_price, Money::from(1000));
        assert_eq!(item.price_rule, PriceRule::List);
        assert_eq!(item.line_total, Money::from(3000));
    }

    #[test]
    fn sale_price_only_when_on_sale() {
        let calc = PricingCalculator::default();
        let mut p = product(1000);
        p.sale_percentage = Some(20.0);
        assert_eq!(calc.unit_price(&p), (Money::from(1000), PriceRule::List));
        p.is_on_sale = true;
        assert_eq!(calc.unit_price(&p), (Money::from(800), PriceRule::Sale));
    }

    #[test]
    fn wholesaler_pricing_takes_precedence_over_sales() {
        let mut p = product(1000);
        p.is_on_sale = true;
        p.sale_percentage = Some(50.0);
        p.wholesaler_price = Some(Money::from(700));
        let ctx = PricingContext { wholesaler: Some(WholesalerTier { discount_percent: 10.0 }), ..Default::default() };
        let calc = PricingCalculator::new(ctx);
        assert_eq!(calc.unit_price(&p), (Money::from(700), PriceRule::Wholesaler));
        p.wholesaler_price = None;
        assert_eq!(calc.unit_price(&p), (Money::from(900), PriceRule::Wholesaler));
    }

    #[test]
    fn wholesaler_without_a_discount_falls_back_to_sale_pricing() {
        let mut p = product(1000);
        p.is_on_sale = true;
        p.sale_percentage = Some(25.0);
        let ctx = PricingContext { wholesaler: Some(WholesalerTier { discount_percent: 0.0 }), ..Default::default() };
        assert_eq!(PricingCalculator::new(ctx).unit_price(&p), (Money::from(750), PriceRule::Sale));
    }

    #[test]
    fn breakdown_with_percent_discount_delivery_and_tax() {
        let ctx = PricingContext {
            order_discount: Some(OrderDiscount::Percent(10.0)),
            delivery_cost: Money::from(500),
            tax_percent: 5.0,
            ..Default::default()
        };
        let b = PricingCalculator::new(ctx).breakdown([Money::from(2000), Money::from(1000)]);
        assert_eq!(b.subtotal, Money::from(3000));
        assert_eq!(b.discount, Money::from(300));
        assert_eq!(b.shipping, Money::from(500));
        assert_eq!(b.tax, Money::from(135));
        assert_eq!(b.total, Money::from(3335));
        assert_eq!(b.commissionable(), Money::from(2700));
    }

    #[test]
    fn flat_discount_is_capped_at_the_subtotal() {
        let ctx = PricingContext { order_discount: Some(OrderDiscount::Flat(Money::from(5000))), ..Default::default() };
        let b = PricingCalculator::new(ctx).breakdown([Money::from(1200)]);
        assert_eq!(b.discount, Money::from(1200));
        assert_eq!(b.total, Money::zero());
    }

    #[test]
    fn discounts_deserialize_from_tagged_json() {
        let d: OrderDiscount = serde_json::from_str(r#"{"percent": 15}"#).unwrap();
        assert_eq!(d, OrderDiscount::Percent(15.0));
        let d: OrderDiscount = serde_json::from_str(r#"{"flat": 250}"#).unwrap();
        assert_eq!(d, OrderDiscount::Flat(Money::from(250)));
    }
}
