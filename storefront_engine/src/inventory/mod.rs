//! # Inventory ledger
//!
//! Stock for a product lives at two levels: a general counter, and an optional set of per-specification-value
//! counters (size, colour, ...). An order line decrements the general counter and every specification value the buyer
//! selected, by the same quantity.
//!
//! This module holds the pure rules: resolving a buyer's selections against the stock rows, validating a request, and
//! planning a restore. The database backends apply the resulting plans with conditional updates, so the rules here are
//! the fast path for precise error messages and the SQL guards are what keep concurrent requests honest.
mod errors;
mod ledger;

pub use errors::{StockError, StockLevel};
pub use ledger::{ProductStock, RestorePlan, SpecificationKey};
