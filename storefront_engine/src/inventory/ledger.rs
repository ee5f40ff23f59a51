use std::fmt::Display;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Product, ProductId, SelectedSpecification, SpecificationStock},
    helpers::canonical_identifier,
    inventory::{StockError, StockLevel},
};

/// Identifies one specification stock row, using the identifiers exactly as they are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecificationKey {
    pub specification_id: String,
    pub value_id: String,
}

impl Display for SpecificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.specification_id, self.value_id)
    }
}

impl From<&SpecificationStock> for SpecificationKey {
    fn from(row: &SpecificationStock) -> Self {
        Self { specification_id: row.specification_id.clone(), value_id: row.value_id.clone() }
    }
}

/// The stock rows a restore can touch, plus the selections that no longer resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorePlan {
    pub matched: Vec<SpecificationKey>,
    pub unmatched: Vec<SelectedSpecification>,
}

/// Snapshot of every stock counter belonging to one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub general_quantity: i64,
    pub sold_count: i64,
    pub specifications: Vec<SpecificationStock>,
}

impl ProductStock {
    pub fn new(product: &Product, specifications: Vec<SpecificationStock>) -> Self {
        Self {
            product_id: product.id.clone(),
            general_quantity: product.general_quantity,
            sold_count: product.sold_count,
            specifications,
        }
    }

    /// Finds the stock row for a selection. Both sides are compared in canonical form, so `7`, `"7"` and `"007"` all
    /// name the same value.
    pub fn find(&self, selected: &SelectedSpecification) -> Option<&SpecificationStock> {
        let spec_id = canonical_identifier(&selected.specification_id);
        let value_id = canonical_identifier(&selected.value_id);
        self.specifications.iter().find(|row| {
            canonical_identifier(&row.specification_id) == spec_id && canonical_identifier(&row.value_id) == value_id
        })
    }

    pub fn specification_quantity(&self, specification_id: &str, value_id: &str) -> Option<i64> {
        self.find(&SelectedSpecification::new(specification_id, value_id)).map(|row| row.quantity)
    }

    /// Checks that `requested` units, with the given selections, can be taken from stock.
    ///
    /// Returns the distinct stock rows that a decrement must touch. Nothing is mutated.
    pub fn validate(
        &self,
        requested: i64,
        selected: &[SelectedSpecification],
    ) -> Result<Vec<SpecificationKey>, StockError> {
        if requested <= 0 {
            return Err(StockError::InvalidQuantity(requested));
        }
        if self.general_quantity < requested {
            return Err(StockError::InsufficientStock {
                product_id: self.product_id.clone(),
                level: StockLevel::General,
                available: self.general_quantity,
                requested,
            });
        }
        let keys = self.resolve(selected)?;
        for key in &keys {
            let available = self.row(key).map(|row| row.quantity).unwrap_or_default();
            if available < requested {
                return Err(StockError::InsufficientStock {
                    product_id: self.product_id.clone(),
                    level: StockLevel::Specification(key.clone()),
                    available,
                    requested,
                });
            }
        }
        Ok(keys)
    }

    /// Maps each selection to the stock row it names. Selecting the same row twice yields it once.
    pub fn resolve(&self, selected: &[SelectedSpecification]) -> Result<Vec<SpecificationKey>, StockError> {
        let mut keys: Vec<SpecificationKey> = Vec::with_capacity(selected.len());
        for selection in selected {
            let row = self.find(selection).ok_or_else(|| StockError::SpecificationNotFound {
                product_id: self.product_id.clone(),
                specification: selection.clone(),
            })?;
            let key = SpecificationKey::from(row);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Works out which rows a restore will credit. Selections that no longer resolve are reported, not rejected.
    pub fn plan_restore(&self, selected: &[SelectedSpecification]) -> RestorePlan {
        let mut plan = RestorePlan::default();
        for selection in selected {
            match self.find(selection) {
                Some(row) => {
                    let key = SpecificationKey::from(row);
                    if !plan.matched.contains(&key) {
                        plan.matched.push(key);
                    }
                },
                None => {
                    warn!(
                        "📦️ Specification {selection} no longer exists on product {}. It will be skipped during restore.",
                        self.product_id
                    );
                    plan.unmatched.push(selection.clone());
                },
            }
        }
        plan
    }

    /// In-memory decrement with the same all-or-nothing semantics as the backends.
    pub fn apply_decrement(&mut self, quantity: i64, selected: &[SelectedSpecification]) -> Result<(), StockError> {
        let keys = self.validate(quantity, selected)?;
        self.general_quantity -= quantity;
        self.sold_count += quantity;
        for key in &keys {
            if let Some(row) = self.row_mut(key) {
                row.quantity -= quantity;
            }
        }
        Ok(())
    }

    /// In-memory restore. Returns the selections that could not be matched.
    pub fn apply_restore(&mut self, quantity: i64, selected: &[SelectedSpecification]) -> Vec<SelectedSpecification> {
        let plan = self.plan_restore(selected);
        self.general_quantity += quantity;
        self.sold_count = (self.sold_count - quantity).max(0);
        for key in &plan.matched {
            if let Some(row) = self.row_mut(key) {
                row.quantity += quantity;
            }
        }
        plan.unmatched
    }

    fn row(&self, key: &SpecificationKey) -> Option<&SpecificationStock> {
        self.specifications.iter().find(|row| row.specification_id == key.specification_id && row.value_id == key.value_id)
    }

    fn row_mut(&mut self, key: &SpecificationKey) -> Option<&mut SpecificationStock> {
        self.specifications
            .iter_mut()
            .find(|row| row.specification_id == key.specification_id && row.value_id == key.value_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(spec: &str, value: &str, quantity: i64) -> SpecificationStock {
        SpecificationStock {
            product_id: ProductId::from("p1"),
            position: 0,
            specification_id: spec.to_string(),
            value_id: value.to_string(),
            display_title: "Size".to_string(),
            display_value: value.to_string(),
            quantity,
        }
    }

    fn stock() -> ProductStock {
        ProductStock {
            product_id: ProductId::from("p1"),
            general_quantity: 5,
            sold_count: 0,
            specifications: vec![row("1", "10", 3), row("1", "11", 5), row("2", "red", 4)],
        }
    }

    #[test]
    fn rejects_non_positive_quantities() {
        assert_eq!(stock().validate(0, &[]), Err(StockError::InvalidQuantity(0)));
        assert_eq!(stock().validate(-2, &[]), Err(StockError::InvalidQuantity(-2)));
    }

    #[test]
    fn general_stock_is_checked_first() {
        let err = stock().validate(10, &[SelectedSpecification::new("9", "9")]).unwrap_err();
        match err {
            StockError::InsufficientStock { level: StockLevel::General, available, requested, .. } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 10);
            },
            e => panic!("Unexpected error: {e}"),
        }
    }

    #[test]
    fn specification_level_shortage() {
        let err = stock().validate(4, &[SelectedSpecification::new("1", "10")]).unwrap_err();
        let StockError::InsufficientStock { level: StockLevel::Specification(key), available, .. } = err else {
            panic!("Expected a specification level shortage");
        };
        assert_eq!(key.value_id, "10");
        assert_eq!(available, 3);
    }

    #[test]
    fn unknown_specification() {
        let err = stock().validate(1, &[SelectedSpecification::new("2", "blue")]).unwrap_err();
        assert!(matches!(err, StockError::SpecificationNotFound { .. }));
    }

    #[test]
    fn identifiers_match_in_any_wire_form() {
        let s = stock();
        let as_numbers: SelectedSpecification =
            serde_json::from_value(serde_json::json!({"specification_id": 1, "value_id": 10})).unwrap();
        let as_strings = SelectedSpecification::new("1", "10");
        let padded = SelectedSpecification::new(" 01", "010 ");
        let a = s.validate(2, &[as_numbers]).unwrap();
        let b = s.validate(2, &[as_strings]).unwrap();
        let c = s.validate(2, &[padded]).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(s.specification_quantity("1", "10.0"), Some(3));
    }

    #[test]
    fn duplicate_selections_touch_a_row_once() {
        let mut s = stock();
        let sel = SelectedSpecification::new("1", "11");
        s.apply_decrement(2, &[sel.clone(), sel]).unwrap();
        assert_eq!(s.specification_quantity("1", "11"), Some(3));
    }

    #[test]
    fn failed_decrement_changes_nothing() {
        let mut s = stock();
        let before = s.clone();
        let selected = [SelectedSpecification::new("1", "11"), SelectedSpecification::new("1", "10")];
        assert!(s.apply_decrement(4, &selected).is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn decrement_then_restore_conserves_every_counter() {
        let mut s = stock();
        let before = s.clone();
        let selected = [SelectedSpecification::new("1", "10"), SelectedSpecification::new("2", "red")];
        s.apply_decrement(3, &selected).unwrap();
        assert_eq!(s.general_quantity, 2);
        assert_eq!(s.sold_count, 3);
        assert_eq!(s.specification_quantity("1", "10"), Some(0));
        assert_eq!(s.specification_quantity("2", "red"), Some(1));
        let unmatched = s.apply_restore(3, &selected);
        assert!(unmatched.is_empty());
        assert_eq!(s, before);
    }

    #[test]
    fn restore_skips_unmatched_rows() {
        let mut s = stock();
        let unmatched = s.apply_restore(1, &[SelectedSpecification::new("3", "gone"), SelectedSpecification::new("1", "10")]);
        assert_eq!(unmatched, vec![SelectedSpecification::new("3", "gone")]);
        assert_eq!(s.general_quantity, 6);
        assert_eq!(s.specification_quantity("1", "10"), Some(4));
    }
}
