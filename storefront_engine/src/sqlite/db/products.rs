use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product, ProductId, SelectedSpecification, SpecificationStock},
    inventory::{ProductStock, SpecificationKey, StockError, StockLevel},
    traits::{RestoreReport, StorefrontDbError},
};

pub async fn fetch_product(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id.as_str()).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_specifications(
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SpecificationStock>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM specification_stock WHERE product_id = $1 ORDER BY position ASC")
        .bind(product_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn fetch_product_stock(
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductStock>, sqlx::Error> {
    let Some(product) = fetch_product(product_id, conn).await? else {
        return Ok(None);
    };
    let specifications = fetch_specifications(product_id, conn).await?;
    Ok(Some(ProductStock::new(&product, specifications)))
}

/// Creates or replaces the product and all of its specification rows. Not atomic on its own; run it in a transaction.
pub async fn upsert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<ProductStock, StorefrontDbError> {
    if product.general_quantity < 0 || product.specifications.iter().any(|s| s.quantity < 0) {
        return Err(StorefrontDbError::InvalidData(format!("Stock for product {} cannot be negative", product.id)));
    }
    let now = Utc::now();
    let saved: Product = sqlx::query_as(
        r#"
            INSERT INTO products (
                id, store_id, name, image_url, price, sale_percentage, is_on_sale, wholesaler_price, is_active,
                general_quantity, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (id) DO UPDATE SET
                store_id = excluded.store_id,
                name = excluded.name,
                image_url = excluded.image_url,
                price = excluded.price,
                sale_percentage = excluded.sale_percentage,
                is_on_sale = excluded.is_on_sale,
                wholesaler_price = excluded.wholesaler_price,
                is_active = excluded.is_active,
                general_quantity = excluded.general_quantity,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(&product.id)
    .bind(&product.store_id)
    .bind(&product.name)
    .bind(&product.image_url)
    .bind(product.price)
    .bind(product.sale_percentage)
    .bind(product.is_on_sale)
    .bind(product.wholesaler_price)
    .bind(product.is_active)
    .bind(product.general_quantity)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM specification_stock WHERE product_id = $1").bind(&product.id).execute(&mut *conn).await?;
    for (position, spec) in product.specifications.into_iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO specification_stock
                    (product_id, position, specification_id, value_id, display_title, display_value, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&saved.id)
        .bind(position as i64)
        .bind(spec.specification_id)
        .bind(spec.value_id)
        .bind(spec.display_title)
        .bind(spec.display_value)
        .bind(spec.quantity)
        .execute(&mut *conn)
        .await?;
    }
    let specifications = fetch_specifications(&saved.id, conn).await?;
    debug!("📦️ Product {} saved with {} specification rows", saved.id, specifications.len());
    Ok(ProductStock::new(&saved, specifications))
}

/// Takes `quantity` units from the general counter and every selected specification row.
///
/// Each counter is changed by one conditional `UPDATE ... WHERE quantity >= $n`. If any of them matches no row, an
/// error is returned and the caller must roll back the surrounding transaction, so a failed decrement never leaves
/// a partial subtraction behind. The general counter is written first so that the transaction holds the write lock
/// before it reads anything.
pub async fn decrement_stock(
    product_id: &ProductId,
    quantity: i64,
    selected: &[SelectedSpecification],
    conn: &mut SqliteConnection,
) -> Result<ProductStock, StorefrontDbError> {
    if quantity <= 0 {
        return Err(StockError::InvalidQuantity(quantity).into());
    }
    let updated = sqlx::query(
        r#"
            UPDATE products
            SET general_quantity = general_quantity - $1, sold_count = sold_count + $1, updated_at = $2
            WHERE id = $3 AND general_quantity >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id.as_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated == 0 {
        let product = fetch_product(product_id, conn)
            .await?
            .ok_or_else(|| StorefrontDbError::ProductNotFound(product_id.clone()))?;
        debug!("📦️ Not enough general stock for {product_id}. {} left, {quantity} requested", product.general_quantity);
        return Err(StockError::InsufficientStock {
            product_id: product_id.clone(),
            level: StockLevel::General,
            available: product.general_quantity,
            requested: quantity,
        }
        .into());
    }
    let stock = fetch_product_stock(product_id, conn)
        .await?
        .ok_or_else(|| StorefrontDbError::ProductNotFound(product_id.clone()))?;
    for key in stock.resolve(selected)? {
        let updated = sqlx::query(
            r#"
                UPDATE specification_stock SET quantity = quantity - $1
                WHERE product_id = $2 AND specification_id = $3 AND value_id = $4 AND quantity >= $1
            "#,
        )
        .bind(quantity)
        .bind(product_id.as_str())
        .bind(&key.specification_id)
        .bind(&key.value_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(specification_shortfall(product_id, key, quantity, conn).await?.into());
        }
    }
    let stock = fetch_product_stock(product_id, conn)
        .await?
        .ok_or_else(|| StorefrontDbError::ProductNotFound(product_id.clone()))?;
    trace!("📦️ {quantity} units of {product_id} taken. {} left in general stock", stock.general_quantity);
    Ok(stock)
}

async fn specification_shortfall(
    product_id: &ProductId,
    key: SpecificationKey,
    requested: i64,
    conn: &mut SqliteConnection,
) -> Result<StockError, sqlx::Error> {
    let available: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM specification_stock WHERE product_id = $1 AND specification_id = $2 AND value_id = $3",
    )
    .bind(product_id.as_str())
    .bind(&key.specification_id)
    .bind(&key.value_id)
    .fetch_optional(conn)
    .await?;
    let err = match available {
        Some(available) => StockError::InsufficientStock {
            product_id: product_id.clone(),
            level: StockLevel::Specification(key),
            available,
            requested,
        },
        None => StockError::SpecificationNotFound {
            product_id: product_id.clone(),
            specification: SelectedSpecification::new(&key.specification_id, &key.value_id),
        },
    };
    Ok(err)
}

/// Credits `quantity` units back to the general counter and to every selection that still resolves.
///
/// Restores are best-effort: a missing product or an unmatched specification is logged and reported, never an error.
pub async fn restore_stock(
    product_id: &ProductId,
    quantity: i64,
    selected: &[SelectedSpecification],
    conn: &mut SqliteConnection,
) -> Result<RestoreReport, StorefrontDbError> {
    if quantity <= 0 {
        warn!("📦️ Ignoring a restore of {quantity} units for {product_id}");
        return Ok(RestoreReport { product_id: product_id.clone(), quantity, product_missing: false, unmatched: vec![] });
    }
    let updated = sqlx::query(
        r#"
            UPDATE products
            SET general_quantity = general_quantity + $1, sold_count = MAX(sold_count - $1, 0), updated_at = $2
            WHERE id = $3
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id.as_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();
    let stock = match fetch_product_stock(product_id, conn).await? {
        Some(stock) if updated > 0 => stock,
        _ => {
            warn!("📦️ Product {product_id} no longer exists. {quantity} units could not be returned to stock.");
            return Ok(RestoreReport::missing_product(product_id.clone(), quantity));
        },
    };
    let plan = stock.plan_restore(selected);
    for key in &plan.matched {
        sqlx::query(
            r#"
                UPDATE specification_stock SET quantity = quantity + $1
                WHERE product_id = $2 AND specification_id = $3 AND value_id = $4
            "#,
        )
        .bind(quantity)
        .bind(product_id.as_str())
        .bind(&key.specification_id)
        .bind(&key.value_id)
        .execute(&mut *conn)
        .await?;
    }
    trace!("📦️ {quantity} units of {product_id} returned to stock");
    Ok(RestoreReport { product_id: product_id.clone(), quantity, product_missing: false, unmatched: plan.unmatched })
}
