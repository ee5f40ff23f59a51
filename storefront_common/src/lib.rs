//! Value types shared by every crate in the storefront workspace.
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
