use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    affiliates::CommissionAccrual,
    db_types::{AffiliateAccount, AffiliateSnapshot, Money, NewAffiliate, OrderNumber, StoreId},
    traits::{AffiliateAccrualRecord, StorefrontDbError},
};

pub async fn fetch_affiliate(
    affiliate_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<AffiliateAccount>, sqlx::Error> {
    let account =
        sqlx::query_as("SELECT * FROM affiliates WHERE id = $1").bind(affiliate_id).fetch_optional(conn).await?;
    Ok(account)
}

/// Looks an affiliate up by id or by referral code within the store. An id match wins over a code match.
pub async fn fetch_affiliate_by_reference(
    store_id: &StoreId,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<AffiliateAccount>, sqlx::Error> {
    let account = sqlx::query_as(
        r#"
            SELECT * FROM affiliates
            WHERE store_id = $1 AND (id = $2 OR code = $2)
            ORDER BY (id = $2) DESC
            LIMIT 1
        "#,
    )
    .bind(store_id.as_str())
    .bind(reference.trim())
    .fetch_optional(conn)
    .await?;
    Ok(account)
}

pub async fn upsert_affiliate(
    affiliate: NewAffiliate,
    conn: &mut SqliteConnection,
) -> Result<AffiliateAccount, sqlx::Error> {
    let now = Utc::now();
    let account = sqlx::query_as(
        r#"
            INSERT INTO affiliates (id, store_id, code, name, commission_percent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                commission_percent = excluded.commission_percent,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(affiliate.id)
    .bind(affiliate.store_id)
    .bind(affiliate.code)
    .bind(affiliate.name)
    .bind(affiliate.commission_percent)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

/// Credits the commission for an order, unless the journal already holds an accrual for it.
///
/// The commission percent is the one frozen into the order when it was placed, so later rate changes do not touch
/// orders already in flight. Returns `None` if nothing was credited, which happens when the order was already accrued
/// or the affiliate no longer exists.
pub async fn accrue_commission(
    affiliate: &AffiliateSnapshot,
    order_number: &OrderNumber,
    sales: Money,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionAccrual>, StorefrontDbError> {
    let affiliate_id = affiliate.affiliate_id.as_str();
    if fetch_affiliate(affiliate_id, conn).await?.is_none() {
        warn!("🤝️ Affiliate {affiliate_id} on order {order_number} no longer exists. No commission will be accrued.");
        return Ok(None);
    }
    let accrual = CommissionAccrual::for_sales(sales, affiliate.commission_percent);
    let inserted = sqlx::query(
        r#"
            INSERT INTO affiliate_accruals (affiliate_id, order_number, sales, commission, accrued_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_number) DO NOTHING
        "#,
    )
    .bind(affiliate_id)
    .bind(order_number.as_str())
    .bind(accrual.sales)
    .bind(accrual.commission)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if inserted == 0 {
        warn!("🤝️ Commission for order {order_number} has already been accrued. Skipping.");
        return Ok(None);
    }
    sqlx::query(
        r#"
            UPDATE affiliates SET
                total_sales = total_sales + $1,
                total_commission = total_commission + $2,
                balance = balance + $2,
                total_orders = total_orders + 1,
                updated_at = $3
            WHERE id = $4
        "#,
    )
    .bind(accrual.sales)
    .bind(accrual.commission)
    .bind(now)
    .bind(affiliate_id)
    .execute(conn)
    .await?;
    debug!("🤝️ Affiliate {affiliate_id} earned {} on sales of {} for order {order_number}", accrual.commission, accrual.sales);
    Ok(Some(accrual))
}

/// Reverses the accrual for an order, limited to the affiliate's current balance. Returns the amounts actually
/// reversed, or `None` if there was nothing to reverse.
pub async fn reverse_commission(
    order_number: &OrderNumber,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionAccrual>, StorefrontDbError> {
    let record: Option<AffiliateAccrualRecord> =
        sqlx::query_as("SELECT * FROM affiliate_accruals WHERE order_number = $1 AND reversed_at IS NULL")
            .bind(order_number.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    let Some(record) = record else {
        return Ok(None);
    };
    let balance = fetch_affiliate(&record.affiliate_id, conn).await?.map(|a| a.balance).unwrap_or_default();
    let reversal = CommissionAccrual { sales: record.sales, commission: record.commission }.reversal(balance);
    if reversal.commission < record.commission {
        warn!(
            "🤝️ Affiliate {} has already been paid part of the commission on order {order_number}. Only {} of {} can be \
             reversed.",
            record.affiliate_id, reversal.commission, record.commission
        );
    }
    sqlx::query(
        r#"
            UPDATE affiliates SET
                total_sales = MAX(total_sales - $1, 0),
                total_commission = total_commission - $2,
                balance = balance - $2,
                total_orders = MAX(total_orders - 1, 0),
                updated_at = $3
            WHERE id = $4
        "#,
    )
    .bind(reversal.sales)
    .bind(reversal.commission)
    .bind(now)
    .bind(&record.affiliate_id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("UPDATE affiliate_accruals SET reversed_at = $1, reversed_commission = $2 WHERE id = $3")
        .bind(now)
        .bind(reversal.commission)
        .bind(record.id)
        .execute(conn)
        .await?;
    debug!("🤝️ Reversed {} of commission for cancelled order {order_number}", reversal.commission);
    Ok(Some(reversal))
}

/// Pays out part of an affiliate's balance. The balance check and the debit are one statement.
pub async fn record_payout(
    affiliate_id: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<AffiliateAccount, StorefrontDbError> {
    if !amount.is_positive() {
        return Err(StorefrontDbError::InvalidData(format!("Payout amounts must be positive, but got {amount}")));
    }
    let account: Option<AffiliateAccount> = sqlx::query_as(
        r#"
            UPDATE affiliates SET
                total_paid_out = total_paid_out + $1,
                balance = balance - $1,
                updated_at = $2
            WHERE id = $3 AND balance >= $1
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(affiliate_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(account) = account else {
        let existing = fetch_affiliate(affiliate_id, conn).await?;
        return Err(match existing {
            Some(a) => StorefrontDbError::InsufficientAffiliateBalance {
                affiliate_id: affiliate_id.to_string(),
                balance: a.balance,
                amount,
            },
            None => StorefrontDbError::AffiliateNotFound(affiliate_id.to_string()),
        });
    };
    sqlx::query("INSERT INTO affiliate_payouts (affiliate_id, amount, paid_at) VALUES ($1, $2, $3)")
        .bind(affiliate_id)
        .bind(amount)
        .bind(account.updated_at)
        .execute(conn)
        .await?;
    info!("🤝️ Paid out {amount} to affiliate {affiliate_id}. Remaining balance: {}", account.balance);
    Ok(account)
}

pub async fn fetch_accruals(
    affiliate_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<AffiliateAccrualRecord>, sqlx::Error> {
    let records = sqlx::query_as("SELECT * FROM affiliate_accruals WHERE affiliate_id = $1 ORDER BY accrued_at, id")
        .bind(affiliate_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}
