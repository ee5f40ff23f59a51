use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{ProductId, SelectedSpecification},
    inventory::SpecificationKey,
};

/// The counter that could not satisfy a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    General,
    Specification(SpecificationKey),
}

impl Display for StockLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockLevel::General => write!(f, "general stock"),
            StockLevel::Specification(key) => write!(f, "specification {key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Quantity must be a positive number, but {0} was requested")]
    InvalidQuantity(i64),
    #[error("Insufficient {level} for product {product_id}. {available} available, {requested} requested")]
    InsufficientStock { product_id: ProductId, level: StockLevel, available: i64, requested: i64 },
    #[error("Product {product_id} has no specification value {specification}")]
    SpecificationNotFound { product_id: ProductId, specification: SelectedSpecification },
}
