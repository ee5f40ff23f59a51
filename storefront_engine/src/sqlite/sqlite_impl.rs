//! `SqliteDatabase` is the concrete storefront backend.
//!
//! It uses SQLite for storage and implements every trait defined in the [`crate::traits`] module. Each trait method
//! that touches more than one row opens its own transaction, so callers never see a half-applied change.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{affiliates, db_url, new_pool, orders, products, stores};
use crate::{
    db_types::{
        AffiliateAccount,
        Customer,
        DeliveryArea,
        FulfillmentStatus,
        LineItem,
        Money,
        NewAffiliate,
        NewOrder,
        NewProduct,
        NewStore,
        Order,
        OrderNumber,
        Product,
        ProductId,
        SelectedSpecification,
        Store,
        StoreId,
    },
    inventory::ProductStock,
    sfe_api::order_objects::OrderQueryFilter,
    traits::{
        AbandonedOrder,
        AffiliateAccrualRecord,
        AffiliateManagement,
        Cancellation,
        CancellationResult,
        InventoryManagement,
        PaymentTransition,
        RestoreReport,
        StoreDirectory,
        StorefrontDatabase,
        StorefrontDbError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

async fn restore_line_items(
    items: &[LineItem],
    conn: &mut sqlx::SqliteConnection,
) -> Result<Vec<RestoreReport>, StorefrontDbError> {
    let mut reports = Vec::with_capacity(items.len());
    for item in items {
        let report = products::restore_stock(&item.product_id, item.quantity, &item.selected_specifications, conn).await?;
        reports.push(report);
    }
    Ok(reports)
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(order_number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_reference(
        &self,
        store_id: &StoreId,
        reference: &str,
    ) -> Result<Option<Order>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_reference(store_id, reference, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn attach_payment_reference(
        &self,
        order_number: &OrderNumber,
        reference: &str,
        authorization_url: &str,
    ) -> Result<Order, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            orders::attach_payment_reference(order_number, reference, authorization_url, Utc::now(), &mut tx).await?;
        match updated {
            Some(order) => {
                tx.commit().await?;
                debug!("📝️ Order {order_number} is now tracked by payment reference {reference}");
                Ok(order)
            },
            None => {
                let existing = orders::fetch_order_by_number(order_number, &mut tx).await?;
                Err(not_awaiting_payment(order_number, existing))
            },
        }
    }

    async fn abandon_order(&self, order_number: &OrderNumber) -> Result<AbandonedOrder, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::delete_unstarted_order(order_number, Utc::now(), &mut tx).await? else {
            let existing = orders::fetch_order_by_number(order_number, &mut tx).await?;
            return Err(not_awaiting_payment(order_number, existing));
        };
        let restored = restore_line_items(&order.line_items, &mut tx).await?;
        tx.commit().await?;
        info!("📝️ Order {order_number} was removed because its payment could not be started. Stock has been restored.");
        Ok(AbandonedOrder { order, restored })
    }

    async fn mark_order_paid(
        &self,
        store_id: &StoreId,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<PaymentTransition, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        if let Some(order) = orders::mark_paid(store_id, reference, paid_at, &mut tx).await? {
            let accrual = match &order.affiliate {
                Some(affiliate) => {
                    let sales = order.pricing.commissionable();
                    affiliates::accrue_commission(affiliate, &order.order_number, sales, paid_at, &mut tx).await?
                },
                None => None,
            };
            tx.commit().await?;
            info!("🔄️ Order {} is paid (reference {reference})", order.order_number);
            return Ok(PaymentTransition::Transitioned { order, accrual });
        }
        let order = orders::fetch_order_by_reference(store_id, reference, &mut tx)
            .await?
            .ok_or_else(|| StorefrontDbError::ReferenceNotFound(reference.to_string()))?;
        if order.is_paid() {
            Ok(PaymentTransition::AlreadyPaid(order))
        } else {
            Ok(PaymentTransition::NotPayable(order))
        }
    }

    async fn cancel_order(
        &self,
        order_number: &OrderNumber,
        cancellation: Cancellation,
    ) -> Result<CancellationResult, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::cancel_order(order_number, &cancellation, &mut tx).await? else {
            let order = orders::fetch_order_by_number(order_number, &mut tx)
                .await?
                .ok_or_else(|| StorefrontDbError::OrderNotFound(order_number.clone()))?;
            if order.is_cancelled() {
                debug!("📝️ Order {order_number} is already cancelled. Nothing to do.");
                return Ok(CancellationResult { order, changed: false, restored: vec![], reversed_commission: None });
            }
            return Err(StorefrontDbError::CannotCancel {
                order_number: order_number.clone(),
                status: order.fulfillment_status,
            });
        };
        let restored = restore_line_items(&order.line_items, &mut tx).await?;
        let reversed_commission = if order.is_paid() {
            affiliates::reverse_commission(order_number, cancellation.cancelled_at, &mut tx).await?
        } else {
            None
        };
        tx.commit().await?;
        info!("📝️ Order {order_number} cancelled by {}: {}", cancellation.cancelled_by, cancellation.reason);
        Ok(CancellationResult { order, changed: true, restored, reversed_commission })
    }

    async fn cancel_unpaid_order_for_reference(
        &self,
        store_id: &StoreId,
        reference: &str,
        cancellation: Cancellation,
    ) -> Result<CancellationResult, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::cancel_unpaid_by_reference(store_id, reference, &cancellation, &mut tx).await? else {
            let order = orders::fetch_order_by_reference(store_id, reference, &mut tx)
                .await?
                .ok_or_else(|| StorefrontDbError::ReferenceNotFound(reference.to_string()))?;
            return Ok(CancellationResult { order, changed: false, restored: vec![], reversed_commission: None });
        };
        let restored = restore_line_items(&order.line_items, &mut tx).await?;
        tx.commit().await?;
        info!("🔄️ Order {} cancelled after payment {reference} failed: {}", order.order_number, cancellation.reason);
        Ok(CancellationResult { order, changed: true, restored, reversed_commission: None })
    }

    async fn update_fulfillment_status(
        &self,
        order_number: &OrderNumber,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    ) -> Result<Order, StorefrontDbError> {
        if !from.can_transition_to(to) {
            return Err(StorefrontDbError::InvalidStatusTransition { order_number: order_number.clone(), from, to });
        }
        let mut conn = self.pool.acquire().await?;
        match orders::update_fulfillment_status(order_number, from, to, Utc::now(), &mut conn).await? {
            Some(order) => Ok(order),
            None => {
                let order = orders::fetch_order_by_number(order_number, &mut conn)
                    .await?
                    .ok_or_else(|| StorefrontDbError::OrderNotFound(order_number.clone()))?;
                Err(StorefrontDbError::InvalidStatusTransition {
                    order_number: order_number.clone(),
                    from: order.fulfillment_status,
                    to,
                })
            },
        }
    }
}

fn not_awaiting_payment(order_number: &OrderNumber, existing: Option<Order>) -> StorefrontDbError {
    match existing {
        None => StorefrontDbError::OrderNotFound(order_number.clone()),
        Some(order) if order.payment_reference.is_some() => StorefrontDbError::PaymentAlreadyStarted(order_number.clone()),
        Some(order) => StorefrontDbError::InvalidData(format!(
            "Order {order_number} is {}/{} and no longer awaits payment",
            order.payment_status, order.fulfillment_status
        )),
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product_stock(&self, product_id: &ProductId) -> Result<Option<ProductStock>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        let stock = products::fetch_product_stock(product_id, &mut conn).await?;
        Ok(stock)
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<ProductStock, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let stock = products::upsert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(stock)
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<ProductStock, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        // Dropping the transaction on error rolls back any counter already decremented.
        let stock = products::decrement_stock(product_id, quantity, selected, &mut tx).await?;
        tx.commit().await?;
        Ok(stock)
    }

    async fn restore_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<RestoreReport, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let report = products::restore_stock(product_id, quantity, selected, &mut tx).await?;
        tx.commit().await?;
        Ok(report)
    }
}

impl StoreDirectory for SqliteDatabase {
    async fn fetch_store(&self, store_id: &StoreId) -> Result<Option<Store>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_store(store_id, &mut conn).await?)
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<Option<Customer>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_customer(customer_id, &mut conn).await?)
    }

    async fn fetch_delivery_area(&self, area_id: &str) -> Result<Option<DeliveryArea>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::fetch_delivery_area(area_id, &mut conn).await?)
    }

    async fn upsert_store(&self, store: NewStore) -> Result<Store, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::upsert_store(store, &mut conn).await?)
    }

    async fn upsert_customer(&self, customer: Customer) -> Result<Customer, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::upsert_customer(customer, &mut conn).await?)
    }

    async fn upsert_delivery_area(&self, area: DeliveryArea) -> Result<DeliveryArea, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(stores::upsert_delivery_area(area, &mut conn).await?)
    }
}

impl AffiliateManagement for SqliteDatabase {
    async fn fetch_affiliate(&self, affiliate_id: &str) -> Result<Option<AffiliateAccount>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(affiliates::fetch_affiliate(affiliate_id, &mut conn).await?)
    }

    async fn fetch_affiliate_by_reference(
        &self,
        store_id: &StoreId,
        reference: &str,
    ) -> Result<Option<AffiliateAccount>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(affiliates::fetch_affiliate_by_reference(store_id, reference, &mut conn).await?)
    }

    async fn upsert_affiliate(&self, affiliate: NewAffiliate) -> Result<AffiliateAccount, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(affiliates::upsert_affiliate(affiliate, &mut conn).await?)
    }

    async fn record_payout(&self, affiliate_id: &str, amount: Money) -> Result<AffiliateAccount, StorefrontDbError> {
        let mut tx = self.pool.begin().await?;
        let account = affiliates::record_payout(affiliate_id, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn fetch_accruals(&self, affiliate_id: &str) -> Result<Vec<AffiliateAccrualRecord>, StorefrontDbError> {
        let mut conn = self.pool.acquire().await?;
        Ok(affiliates::fetch_accruals(affiliate_id, &mut conn).await?)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SF_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn run_migrations(&self) -> Result<(), StorefrontDbError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorefrontDbError::DatabaseError(format!("Migration failed: {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
