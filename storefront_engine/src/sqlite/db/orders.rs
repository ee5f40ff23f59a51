use chrono::{DateTime, Utc};
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{FulfillmentStatus, LineItem, NewOrder, Order, OrderNumber, StoreId},
    sfe_api::order_objects::OrderQueryFilter,
    traits::{Cancellation, StorefrontDbError},
};

/// Inserts a new order, and its line items, in `Unpaid`/`Pending`. This is not atomic. Embed the call in a
/// transaction and pass `&mut *tx` as the connection.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorefrontDbError> {
    let shipping = serde_json::to_string(&order.shipping_info).map_err(|e| StorefrontDbError::InvalidData(e.to_string()))?;
    let billing = order
        .billing_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StorefrontDbError::InvalidData(e.to_string()))?;
    let (affiliate_id, affiliate_code, affiliate_pct) = match &order.affiliate {
        Some(a) => (Some(a.affiliate_id.clone()), Some(a.code.clone()), Some(a.commission_percent)),
        None => (None, None, None),
    };
    let mut saved: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                store_id,
                store_name,
                store_email,
                currency,
                customer_user_id,
                customer_guest_id,
                customer_name,
                customer_email,
                customer_phone,
                customer_is_wholesaler,
                shipping_info,
                billing_info,
                delivery_area_id,
                subtotal,
                discount,
                shipping_cost,
                tax,
                total,
                affiliate_id,
                affiliate_code,
                affiliate_commission_percent,
                notes,
                created_at,
                updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22,
                $23, $24, $24
            )
            RETURNING *;
        "#,
    )
    .bind(&order.order_number)
    .bind(&order.store.store_id)
    .bind(&order.store.name)
    .bind(&order.store.email)
    .bind(&order.store.currency)
    .bind(&order.customer.user_id)
    .bind(&order.customer.guest_id)
    .bind(&order.customer.name)
    .bind(&order.customer.email)
    .bind(&order.customer.phone)
    .bind(order.customer.is_wholesaler)
    .bind(shipping)
    .bind(billing)
    .bind(&order.delivery_area_id)
    .bind(order.pricing.subtotal)
    .bind(order.pricing.discount)
    .bind(order.pricing.shipping)
    .bind(order.pricing.tax)
    .bind(order.pricing.total)
    .bind(affiliate_id)
    .bind(affiliate_code)
    .bind(affiliate_pct)
    .bind(&order.notes)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for (position, item) in order.line_items.iter().enumerate() {
        insert_line_item(saved.id, position as i64, item, conn).await?;
    }
    saved.line_items = order.line_items;
    debug!("📝️ Order {} inserted with id {} and {} line items", saved.order_number, saved.id, saved.line_items.len());
    Ok(saved)
}

async fn insert_line_item(
    order_id: i64,
    position: i64,
    item: &LineItem,
    conn: &mut SqliteConnection,
) -> Result<(), StorefrontDbError> {
    let selections =
        serde_json::to_string(&item.selected_specifications).map_err(|e| StorefrontDbError::InvalidData(e.to_string()))?;
    sqlx::query(
        r#"
            INSERT INTO order_items (
                order_id, position, product_id, product_name, product_image, list_price, unit_price, price_rule,
                quantity, line_total, selected_specifications
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order_id)
    .bind(position)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(&item.product_image)
    .bind(item.list_price)
    .bind(item.unit_price)
    .bind(item.price_rule)
    .bind(item.quantity)
    .bind(item.line_total)
    .bind(selections)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_line_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY position ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

async fn with_line_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.line_items = fetch_line_items(order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    with_line_items(order, conn).await
}

pub async fn fetch_order_by_reference(
    store_id: &StoreId,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE store_id = $1 AND payment_reference = $2")
        .bind(store_id.as_str())
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;
    with_line_items(order, conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(store_id) = query.store_id {
        where_clause.push("store_id = ");
        where_clause.push_bind_unseparated(store_id.0);
    }
    if let Some(user_id) = query.customer_user_id {
        where_clause.push("customer_user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(guest_id) = query.customer_guest_id {
        where_clause.push("customer_guest_id = ");
        where_clause.push_bind_unseparated(guest_id);
    }
    if let Some(status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(statuses) = query.fulfillment_status.filter(|s| !s.is_empty()) {
        let statuses = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("fulfillment_status IN ({statuses})"));
    }
    if let Some(present) = query.has_payment_reference {
        where_clause.push(if present { "payment_reference IS NOT NULL" } else { "payment_reference IS NULL" });
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let orders: Vec<Order> = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    let mut result = Vec::with_capacity(orders.len());
    for mut order in orders {
        order.line_items = fetch_line_items(order.id, conn).await?;
        result.push(order);
    }
    trace!("📝️ {} orders matched the query", result.len());
    Ok(result)
}

/// Records the gateway reference for an order whose payment has not started yet.
///
/// Returns `None` if the order does not exist, already has a reference, or is no longer awaiting payment.
pub async fn attach_payment_reference(
    order_number: &OrderNumber,
    reference: &str,
    authorization_url: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorefrontDbError> {
    let result = sqlx::query_as(
        r#"
            UPDATE orders SET payment_reference = $1, authorization_url = $2, updated_at = $3
            WHERE order_number = $4
              AND payment_reference IS NULL
              AND payment_status = 'Unpaid'
              AND fulfillment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(authorization_url)
    .bind(now)
    .bind(order_number.as_str())
    .fetch_optional(&mut *conn)
    .await;
    let order = match result {
        Ok(order) => order,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(StorefrontDbError::DuplicateReference(reference.to_string()));
        },
        Err(e) => return Err(e.into()),
    };
    Ok(with_line_items(order, conn).await?)
}

/// Deletes an order whose payment never started. The line items go with it (cascade), so they are read first and
/// returned alongside the deleted order.
///
/// The guarded `UPDATE` runs first, so the transaction holds the write lock before it reads anything.
pub async fn delete_unstarted_order(
    order_number: &OrderNumber,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let claimed: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET updated_at = $1
            WHERE order_number = $2
              AND payment_reference IS NULL
              AND payment_status = 'Unpaid'
              AND fulfillment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(order_number.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    let Some(mut order) = with_line_items(claimed, conn).await? else {
        return Ok(None);
    };
    sqlx::query("DELETE FROM orders WHERE id = $1").bind(order.id).execute(&mut *conn).await?;
    order.updated_at = now;
    Ok(Some(order))
}

/// The payment compare-and-set. Only an order that is `Unpaid` and `Pending` is moved to `Paid`/`Processing`.
/// Returns `None` if no row matched, i.e. the order is already paid, cancelled, or unknown.
pub async fn mark_paid(
    store_id: &StoreId,
    reference: &str,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET payment_status = 'Paid', fulfillment_status = 'Processing', paid_at = $1, updated_at = $1
            WHERE store_id = $2
              AND payment_reference = $3
              AND payment_status = 'Unpaid'
              AND fulfillment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(paid_at)
    .bind(store_id.as_str())
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;
    with_line_items(order, conn).await
}

/// Cancels any order that has not shipped and is not already cancelled. Returns `None` if no row matched.
pub async fn cancel_order(
    order_number: &OrderNumber,
    cancellation: &Cancellation,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                fulfillment_status = 'Cancelled',
                cancelled_at = $1,
                cancelled_by = $2,
                cancellation_reason = $3,
                updated_at = $1
            WHERE order_number = $4 AND fulfillment_status NOT IN ('Shipped', 'Delivered', 'Cancelled')
            RETURNING *;
        "#,
    )
    .bind(cancellation.cancelled_at)
    .bind(&cancellation.cancelled_by)
    .bind(&cancellation.reason)
    .bind(order_number.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    with_line_items(order, conn).await
}

/// Cancels the order behind a payment reference, but only while it is still `Unpaid` and `Pending`.
pub async fn cancel_unpaid_by_reference(
    store_id: &StoreId,
    reference: &str,
    cancellation: &Cancellation,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                fulfillment_status = 'Cancelled',
                cancelled_at = $1,
                cancelled_by = $2,
                cancellation_reason = $3,
                updated_at = $1
            WHERE store_id = $4
              AND payment_reference = $5
              AND payment_status = 'Unpaid'
              AND fulfillment_status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(cancellation.cancelled_at)
    .bind(&cancellation.cancelled_by)
    .bind(&cancellation.reason)
    .bind(store_id.as_str())
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;
    with_line_items(order, conn).await
}

/// Moves the fulfilment status from `from` to `to`. Returns `None` if the order is not currently in `from`.
pub async fn update_fulfillment_status(
    order_number: &OrderNumber,
    from: FulfillmentStatus,
    to: FulfillmentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET fulfillment_status = $1, updated_at = $2 WHERE order_number = $3 AND fulfillment_status = $4 \
         RETURNING *",
    )
    .bind(to.to_string())
    .bind(now)
    .bind(order_number.as_str())
    .bind(from.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    with_line_items(order, conn).await
}
