//! Bundle availability.
//!
//! A bundle is sellable only as far as its scarcest component allows. The
//! figure is always computed from the stock passed in and never stored:
//! it is advisory and may be stale as soon as it is returned.

use serde::{Deserialize, Serialize};

/// One component of a bundle together with its current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleComponent {
    /// Component SKU, when known. Only used for reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    /// Units of the component consumed per bundle.
    pub required_quantity: i64,

    /// Units of the component currently available.
    pub available_stock: i64,
}

impl BundleComponent {
    pub fn new(required_quantity: i64, available_stock: i64) -> Self {
        Self {
            sku: None,
            required_quantity,
            available_stock,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Whole bundles this component alone could supply.
    ///
    /// A non-positive requirement supplies none, as does negative stock.
    pub fn supportable_units(&self) -> u64 {
        if self.required_quantity <= 0 || self.available_stock <= 0 {
            return 0;
        }
        (self.available_stock / self.required_quantity) as u64
    }
}

/// Returns how many whole bundles can be assembled from `components`.
///
/// An empty component list yields 0.
pub fn calculate_possible_quantity(components: &[BundleComponent]) -> u64 {
    components
        .iter()
        .map(BundleComponent::supportable_units)
        .min()
        .unwrap_or(0)
}

/// Returns the component that bounds the bundle, if there is one.
///
/// Ties go to the first component in the list.
pub fn limiting_component(components: &[BundleComponent]) -> Option<&BundleComponent> {
    components
        .iter()
        .enumerate()
        .min_by_key(|(index, c)| (c.supportable_units(), *index))
        .map(|(_, c)| c)
}
