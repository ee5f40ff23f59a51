use std::fmt::Debug;

use crate::{
    db_types::{AffiliateAccount, Money, StoreId},
    sfe_api::errors::AffiliateError,
    traits::{AffiliateAccrualRecord, AffiliateManagement},
};

/// Read access to affiliate accounts, plus payouts.
pub struct AffiliateApi<B> {
    db: B,
}

impl<B> Debug for AffiliateApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AffiliateApi")
    }
}

impl<B> AffiliateApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AffiliateApi<B>
where B: AffiliateManagement
{
    /// The affiliate's account, if it belongs to `store_id`.
    pub async fn account(&self, store_id: &StoreId, affiliate_id: &str) -> Result<AffiliateAccount, AffiliateError> {
        self.db
            .fetch_affiliate(affiliate_id)
            .await?
            .filter(|a| &a.store_id == store_id)
            .ok_or_else(|| AffiliateError::NotFound(affiliate_id.to_string()))
    }

    /// Pays out part of the balance. The balance can never go below zero.
    pub async fn payout(&self, affiliate_id: &str, amount: Money) -> Result<AffiliateAccount, AffiliateError> {
        if !amount.is_positive() {
            return Err(AffiliateError::InvalidAmount(amount));
        }
        Ok(self.db.record_payout(affiliate_id, amount).await?)
    }

    pub async fn accruals(&self, affiliate_id: &str) -> Result<Vec<AffiliateAccrualRecord>, AffiliateError> {
        Ok(self.db.fetch_accruals(affiliate_id).await?)
    }
}
