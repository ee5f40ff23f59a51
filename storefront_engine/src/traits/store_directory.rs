use crate::{
    db_types::{Customer, DeliveryArea, NewStore, Store, StoreId},
    traits::StorefrontDbError,
};

/// Lookups for the records an order is placed against. Store, customer and delivery-area management happens
/// elsewhere; the `upsert_*` methods exist so that deployments and tests can seed data.
#[allow(async_fn_in_trait)]
pub trait StoreDirectory {
    async fn fetch_store(&self, store_id: &StoreId) -> Result<Option<Store>, StorefrontDbError>;
    async fn fetch_customer(&self, customer_id: &str) -> Result<Option<Customer>, StorefrontDbError>;
    async fn fetch_delivery_area(&self, area_id: &str) -> Result<Option<DeliveryArea>, StorefrontDbError>;

    async fn upsert_store(&self, store: NewStore) -> Result<Store, StorefrontDbError>;
    async fn upsert_customer(&self, customer: Customer) -> Result<Customer, StorefrontDbError>;
    async fn upsert_delivery_area(&self, area: DeliveryArea) -> Result<DeliveryArea, StorefrontDbError>;
}
