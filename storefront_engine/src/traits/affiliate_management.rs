use crate::{
    db_types::{AffiliateAccount, Money, NewAffiliate, StoreId},
    traits::{AffiliateAccrualRecord, StorefrontDbError},
};

#[allow(async_fn_in_trait)]
pub trait AffiliateManagement {
    async fn fetch_affiliate(&self, affiliate_id: &str) -> Result<Option<AffiliateAccount>, StorefrontDbError>;

    /// Affiliates are referenced either by id or by their store-scoped referral code.
    async fn fetch_affiliate_by_reference(
        &self,
        store_id: &StoreId,
        reference: &str,
    ) -> Result<Option<AffiliateAccount>, StorefrontDbError>;

    async fn upsert_affiliate(&self, affiliate: NewAffiliate) -> Result<AffiliateAccount, StorefrontDbError>;

    /// Records a payout to the affiliate. Fails with `InsufficientAffiliateBalance` unless `balance >= amount`.
    async fn record_payout(&self, affiliate_id: &str, amount: Money) -> Result<AffiliateAccount, StorefrontDbError>;

    /// The commission journal for the affiliate, oldest first.
    async fn fetch_accruals(&self, affiliate_id: &str) -> Result<Vec<AffiliateAccrualRecord>, StorefrontDbError>;
}
