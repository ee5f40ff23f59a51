mod identifiers;
mod order_number;

pub use identifiers::{canonical_identifier, deserialize_identifier, identifier_from_value};
pub use order_number::{is_valid_order_number, new_order_number};
