use crate::{
    db_types::{NewProduct, Product, ProductId, SelectedSpecification},
    inventory::ProductStock,
    traits::{RestoreReport, StorefrontDbError},
};

#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StorefrontDbError>;

    /// The product's general counter and every specification stock row, in display order.
    async fn fetch_product_stock(&self, product_id: &ProductId) -> Result<Option<ProductStock>, StorefrontDbError>;

    /// Creates or replaces a product, including its specification stock rows. Used for seeding.
    async fn upsert_product(&self, product: NewProduct) -> Result<ProductStock, StorefrontDbError>;

    /// Takes `quantity` units from the general counter and from every selected specification row.
    ///
    /// Each counter is updated with a single "subtract if sufficient" statement, and all of them run in one
    /// transaction: either every counter is decremented or none is. `sold_count` increases by `quantity`.
    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<ProductStock, StorefrontDbError>;

    /// The mirror of [`Self::decrement_stock`]. Selections that no longer match a row are logged and skipped, and a
    /// product that has been removed is reported rather than treated as an error.
    async fn restore_stock(
        &self,
        product_id: &ProductId,
        quantity: i64,
        selected: &[SelectedSpecification],
    ) -> Result<RestoreReport, StorefrontDbError>;
}
