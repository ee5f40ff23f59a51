use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        AffiliateSnapshot,
        CustomerSnapshot,
        FulfillmentStatus,
        LineItem,
        NewOrder,
        Order,
        OrderNumber,
        Product,
        StoreId,
        StoreSnapshot,
    },
    events::{EventProducers, OrderCancelledEvent, OrderPlacedEvent},
    helpers::new_order_number,
    inventory::ProductStock,
    pricing::{PricingCalculator, PricingContext, WholesalerTier},
    sfe_api::{
        errors::OrderFlowError,
        order_objects::{BuyerIdentity, OrderItemRequest, OrderQueryFilter, PlaceOrderRequest},
    },
    traits::{Cancellation, CancellationResult, StorefrontDatabase, StorefrontDbError},
};

/// `OrderFlowApi` places orders and manages their lifecycle after placement (cancellation and fulfilment).
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// A line item that passed validation, waiting for its stock to be taken.
struct PreparedItem {
    request: OrderItemRequest,
    line: LineItem,
}

impl<B> OrderFlowApi<B>
where B: StorefrontDatabase
{
    /// Places a new order against `store_id`.
    ///
    /// Every item is validated and priced before any stock is touched. Stock is then taken item by item; if any
    /// decrement fails (another buyer got there first), everything already taken by this request is given back and
    /// the whole placement fails. The order is stored as `Unpaid`/`Pending`. Affiliate commission is not accrued
    /// here, only once the order is paid.
    pub async fn place_order(&self, store_id: &StoreId, request: PlaceOrderRequest) -> Result<Order, OrderFlowError> {
        let identity = request.identity()?;
        if request.items.is_empty() {
            return Err(OrderFlowError::Validation("An order must contain at least one item".to_string()));
        }
        let store = self.db.fetch_store(store_id).await?.ok_or_else(|| StorefrontDbError::StoreNotFound(store_id.clone()))?;
        if !store.is_active {
            return Err(OrderFlowError::Validation(format!("Store {store_id} is not accepting orders")));
        }
        let (customer, wholesaler) = self.customer_snapshot(&identity, &request).await?;
        let delivery_cost = match &request.delivery_area_id {
            Some(area_id) => {
                let area = self
                    .db
                    .fetch_delivery_area(area_id)
                    .await?
                    .filter(|a| &a.store_id == store_id)
                    .ok_or_else(|| StorefrontDbError::DeliveryAreaNotFound(area_id.clone()))?;
                area.fee
            },
            None => Default::default(),
        };
        let affiliate = match &request.affiliate {
            Some(reference) => {
                let account = self
                    .db
                    .fetch_affiliate_by_reference(store_id, reference)
                    .await?
                    .ok_or_else(|| StorefrontDbError::AffiliateNotFound(reference.clone()))?;
                Some(AffiliateSnapshot::from(&account))
            },
            None => None,
        };
        let calculator = PricingCalculator::new(PricingContext {
            wholesaler,
            order_discount: request.coupon,
            delivery_cost,
            tax_percent: store.tax_percent,
        });

        let mut prepared = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let (product, stock) = self.fetch_sellable_product(store_id, item).await?;
            stock.validate(item.quantity, &item.selected_specifications)?;
            let priced = calculator.price_item(&product, item.quantity);
            let line = LineItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                product_image: product.image_url.clone(),
                list_price: product.price,
                unit_price: priced.unit_price,
                price_rule: priced.price_rule,
                quantity: item.quantity,
                line_total: priced.line_total,
                selected_specifications: item.selected_specifications.clone(),
            };
            prepared.push(PreparedItem { request: item.clone(), line });
        }

        let mut taken: Vec<&PreparedItem> = Vec::with_capacity(prepared.len());
        for item in &prepared {
            let req = &item.request;
            if let Err(e) = self.db.decrement_stock(&req.product_id, req.quantity, &req.selected_specifications).await {
                warn!("📝️ Could not take stock for {}: {e}. Rolling back {} earlier items.", req.product_id, taken.len());
                self.give_back(&taken).await;
                return Err(e.into());
            }
            taken.push(item);
        }

        let pricing = calculator.breakdown(prepared.iter().map(|p| p.line.line_total));
        let now = Utc::now();
        let new_order = NewOrder {
            order_number: new_order_number(now),
            store: StoreSnapshot::from(&store),
            customer,
            shipping_info: request.shipping.clone(),
            billing_info: request.billing.clone(),
            delivery_area_id: request.delivery_area_id.clone(),
            line_items: prepared.iter().map(|p| p.line.clone()).collect(),
            pricing,
            affiliate,
            notes: request.notes.clone(),
            created_at: now,
        };
        let order = match self.db.insert_order(new_order).await {
            Ok(order) => order,
            Err(e) => {
                error!("📝️ Could not save a new order for store {store_id}: {e}. Returning its stock.");
                self.give_back(&taken).await;
                return Err(e.into());
            },
        };
        info!(
            "📝️ Order {} placed in store {store_id}: {} items, total {} {}",
            order.order_number,
            order.line_items.len(),
            order.pricing.total,
            order.store.currency
        );
        self.producers.publish_order_placed(OrderPlacedEvent::new(order.clone())).await;
        Ok(order)
    }

    async fn customer_snapshot(
        &self,
        identity: &BuyerIdentity,
        request: &PlaceOrderRequest,
    ) -> Result<(CustomerSnapshot, Option<WholesalerTier>), OrderFlowError> {
        match identity {
            BuyerIdentity::User(user_id) => {
                let customer = self
                    .db
                    .fetch_customer(user_id)
                    .await?
                    .ok_or_else(|| StorefrontDbError::CustomerNotFound(user_id.clone()))?;
                let wholesaler = customer.wholesaler_verified.then(|| WholesalerTier {
                    discount_percent: customer.wholesaler_discount_percent.unwrap_or_default(),
                });
                let snapshot = CustomerSnapshot {
                    user_id: Some(customer.id),
                    guest_id: None,
                    name: customer.name,
                    email: customer.email,
                    phone: customer.phone.or_else(|| Some(request.shipping.phone.clone())),
                    is_wholesaler: customer.wholesaler_verified,
                };
                Ok((snapshot, wholesaler))
            },
            BuyerIdentity::Guest(guest_id) => {
                let snapshot = CustomerSnapshot {
                    user_id: None,
                    guest_id: Some(guest_id.clone()),
                    name: request.shipping.name.clone(),
                    email: request.shipping.email.clone(),
                    phone: Some(request.shipping.phone.clone()),
                    is_wholesaler: false,
                };
                Ok((snapshot, None))
            },
        }
    }

    async fn fetch_sellable_product(
        &self,
        store_id: &StoreId,
        item: &OrderItemRequest,
    ) -> Result<(Product, ProductStock), OrderFlowError> {
        let not_found = || StorefrontDbError::ProductNotFound(item.product_id.clone());
        let product = self.db.fetch_product(&item.product_id).await?.filter(|p| &p.store_id == store_id).ok_or_else(not_found)?;
        if !product.is_active {
            return Err(OrderFlowError::Validation(format!("{} is no longer available", product.name)));
        }
        let stock = self.db.fetch_product_stock(&item.product_id).await?.ok_or_else(not_found)?;
        Ok((product, stock))
    }

    /// The compensating restore for stock this request already took. Failures are logged, never raised.
    async fn give_back(&self, taken: &[&PreparedItem]) {
        for item in taken.iter().rev() {
            let req = &item.request;
            if let Err(e) = self.db.restore_stock(&req.product_id, req.quantity, &req.selected_specifications).await {
                error!(
                    "📝️ Could not return {} units of {} to stock: {e}. The ledger needs manual attention.",
                    req.quantity, req.product_id
                );
            }
        }
    }

    pub async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.fetch_order(order_number).await?)
    }

    /// Fetches an order, treating an order from another store as missing.
    pub async fn order_for_store(&self, store_id: &StoreId, order_number: &OrderNumber) -> Result<Order, OrderFlowError> {
        self.db
            .fetch_order(order_number)
            .await?
            .filter(|o| &o.store.store_id == store_id)
            .ok_or_else(|| StorefrontDbError::OrderNotFound(order_number.clone()).into())
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.search_orders(query).await?)
    }

    /// Cancels an order and returns its stock. Orders that have shipped or been delivered cannot be cancelled.
    /// Cancelling an order twice is harmless: the second call reports `changed: false`.
    pub async fn cancel_order(
        &self,
        store_id: &StoreId,
        order_number: &OrderNumber,
        reason: &str,
        cancelled_by: &str,
    ) -> Result<CancellationResult, OrderFlowError> {
        self.order_for_store(store_id, order_number).await?;
        let result = self.db.cancel_order(order_number, Cancellation::new(reason, cancelled_by)).await?;
        if result.changed {
            self.producers.publish_order_cancelled(OrderCancelledEvent::new(result.order.clone())).await;
        }
        Ok(result)
    }

    /// Administrative fulfilment progression (`Processing` → `Shipped` → `Delivered`, or on to `Refunded`).
    pub async fn update_fulfillment_status(
        &self,
        order_number: &OrderNumber,
        status: FulfillmentStatus,
    ) -> Result<Order, OrderFlowError> {
        let order =
            self.db.fetch_order(order_number).await?.ok_or_else(|| StorefrontDbError::OrderNotFound(order_number.clone()))?;
        let updated = self.db.update_fulfillment_status(order_number, order.fulfillment_status, status).await?;
        info!("📝️ Order {order_number} moved from {} to {status}", order.fulfillment_status);
        Ok(updated)
    }
}
