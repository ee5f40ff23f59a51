use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Customer, DeliveryArea, NewStore, Store, StoreId};

pub async fn fetch_store(store_id: &StoreId, conn: &mut SqliteConnection) -> Result<Option<Store>, sqlx::Error> {
    let store = sqlx::query_as("SELECT * FROM stores WHERE id = $1").bind(store_id.as_str()).fetch_optional(conn).await?;
    Ok(store)
}

pub async fn upsert_store(store: NewStore, conn: &mut SqliteConnection) -> Result<Store, sqlx::Error> {
    let now = Utc::now();
    let store: Store = sqlx::query_as(
        r#"
            INSERT INTO stores (id, name, email, currency, tax_percent, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                currency = excluded.currency,
                tax_percent = excluded.tax_percent,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(store.id)
    .bind(store.name)
    .bind(store.email)
    .bind(store.currency)
    .bind(store.tax_percent)
    .bind(store.is_active)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Store {} saved", store.id);
    Ok(store)
}

pub async fn fetch_customer(customer_id: &str, conn: &mut SqliteConnection) -> Result<Option<Customer>, sqlx::Error> {
    let customer = sqlx::query_as("SELECT * FROM customers WHERE id = $1").bind(customer_id).fetch_optional(conn).await?;
    Ok(customer)
}

pub async fn upsert_customer(customer: Customer, conn: &mut SqliteConnection) -> Result<Customer, sqlx::Error> {
    let customer = sqlx::query_as(
        r#"
            INSERT INTO customers (id, name, email, phone, wholesaler_verified, wholesaler_discount_percent)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                wholesaler_verified = excluded.wholesaler_verified,
                wholesaler_discount_percent = excluded.wholesaler_discount_percent
            RETURNING *;
        "#,
    )
    .bind(customer.id)
    .bind(customer.name)
    .bind(customer.email)
    .bind(customer.phone)
    .bind(customer.wholesaler_verified)
    .bind(customer.wholesaler_discount_percent)
    .fetch_one(conn)
    .await?;
    Ok(customer)
}

pub async fn fetch_delivery_area(area_id: &str, conn: &mut SqliteConnection) -> Result<Option<DeliveryArea>, sqlx::Error> {
    let area = sqlx::query_as("SELECT * FROM delivery_areas WHERE id = $1").bind(area_id).fetch_optional(conn).await?;
    Ok(area)
}

pub async fn upsert_delivery_area(area: DeliveryArea, conn: &mut SqliteConnection) -> Result<DeliveryArea, sqlx::Error> {
    let area = sqlx::query_as(
        r#"
            INSERT INTO delivery_areas (id, store_id, name, fee) VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET store_id = excluded.store_id, name = excluded.name, fee = excluded.fee
            RETURNING *;
        "#,
    )
    .bind(area.id)
    .bind(area.store_id)
    .bind(area.name)
    .bind(area.fee)
    .fetch_one(conn)
    .await?;
    Ok(area)
}
