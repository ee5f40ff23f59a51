use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProduct, ProductId, SelectedSpecification},
    inventory::{ProductStock, SpecificationKey},
    sfe_api::errors::OrderFlowError,
    traits::{InventoryManagement, RestoreReport, StorefrontDbError},
};

/// Direct access to the inventory ledger: stock levels, validation and the atomic decrement / restore pair.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub async fn stock(&self, product_id: &ProductId) -> Result<ProductStock, OrderFlowError> {
        let stock = self
            .db
            .fetch_product_stock(product_id)
            .await?
            .ok_or_else(|| StorefrontDbError::ProductNotFound(product_id.clone()))?;
        Ok(stock)
    }

    /// Checks a request against current stock without changing anything. Returns the stock rows a decrement would
    /// touch.
    pub async fn validate(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<Vec<SpecificationKey>, OrderFlowError> {
        let stock = self.stock(product_id).await?;
        Ok(stock.validate(quantity, selected)?)
    }

    pub async fn decrement(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<ProductStock, OrderFlowError> {
        let stock = self.db.decrement_stock(product_id, quantity, selected).await?;
        debug!("📦️ {quantity} units of {product_id} taken from stock");
        Ok(stock)
    }

    pub async fn restore(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<RestoreReport, OrderFlowError> {
        Ok(self.db.restore_stock(product_id, quantity, selected).await?)
    }

    pub async fn upsert_product(&self, product: NewProduct) -> Result<ProductStock, OrderFlowError> {
        Ok(self.db.upsert_product(product).await?)
    }
}
