//! Component stock and bundle reservations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::bundle::{BundleComponent, calculate_possible_quantity};

/// Errors from stock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Insufficient stock: requested {requested} bundles, {available} possible")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("Bundle has no components")]
    EmptyBundle,

    #[error("Invalid component requirement for {sku}: {required_quantity}")]
    InvalidRequirement { sku: String, required_quantity: i64 },
}

/// A bundle's recipe: units of each component SKU per bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDefinition {
    pub sku: String,
    pub components: Vec<(String, i64)>,
}

impl BundleDefinition {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, sku: impl Into<String>, required_quantity: i64) -> Self {
        self.components.push((sku.into(), required_quantity));
        self
    }

    /// Units per bundle for each distinct SKU. A SKU listed more than once
    /// needs the sum of its entries.
    pub fn requirements(&self) -> BTreeMap<&str, i64> {
        let mut needed = BTreeMap::new();
        for (sku, required_quantity) in &self.components {
            *needed.entry(sku.as_str()).or_insert(0) += required_quantity;
        }
        needed
    }
}

/// Available units per SKU.
///
/// Reads are advisory. `reserve_bundle` is the only way to claim stock for
/// bundles: it recomputes availability and decrements under one write
/// lock, so two reservations can never both spend the same units.
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    stock: Arc<RwLock<HashMap<String, i64>>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the available units of a SKU.
    pub async fn set_stock(&self, sku: impl Into<String>, units: i64) {
        self.stock.write().await.insert(sku.into(), units);
    }

    /// Adds `delta` units (negative to remove) and returns the new level.
    pub async fn adjust(&self, sku: &str, delta: i64) -> i64 {
        let mut stock = self.stock.write().await;
        let level = stock.entry(sku.to_string()).or_insert(0);
        *level += delta;
        *level
    }

    /// Current units of a SKU; unknown SKUs have none.
    pub async fn available(&self, sku: &str) -> i64 {
        self.stock.read().await.get(sku).copied().unwrap_or(0)
    }

    /// Bundles that current stock could assemble. Advisory only.
    pub async fn possible_quantity(&self, bundle: &BundleDefinition) -> u64 {
        let stock = self.stock.read().await;
        calculate_possible_quantity(&Self::components(&stock, bundle))
    }

    /// Claims stock for `units` bundles, all components or none.
    pub async fn reserve_bundle(
        &self,
        bundle: &BundleDefinition,
        units: u64,
    ) -> Result<u64, InventoryError> {
        if bundle.components.is_empty() {
            return Err(InventoryError::EmptyBundle);
        }
        if let Some((sku, required_quantity)) =
            bundle.components.iter().find(|(_, qty)| *qty <= 0)
        {
            return Err(InventoryError::InvalidRequirement {
                sku: sku.clone(),
                required_quantity: *required_quantity,
            });
        }

        let mut stock = self.stock.write().await;
        let available = calculate_possible_quantity(&Self::components(&stock, bundle));
        if units > available {
            tracing::debug!(bundle = %bundle.sku, units, available, "bundle reservation refused");
            return Err(InventoryError::InsufficientStock {
                requested: units,
                available,
            });
        }

        let units = units as i64;
        for (sku, required_quantity) in bundle.requirements() {
            *stock.entry(sku.to_string()).or_insert(0) -= required_quantity * units;
        }
        Ok(available - units as u64)
    }

    fn components(stock: &HashMap<String, i64>, bundle: &BundleDefinition) -> Vec<BundleComponent> {
        bundle
            .requirements()
            .into_iter()
            .map(|(sku, qty)| {
                BundleComponent::new(qty, stock.get(sku).copied().unwrap_or(0)).with_sku(sku)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bike() -> BundleDefinition {
        BundleDefinition::new("bike")
            .with_component("frame", 1)
            .with_component("wheel", 2)
    }

    async fn stocked() -> StockLedger {
        let ledger = StockLedger::new();
        ledger.set_stock("frame", 5).await;
        ledger.set_stock("wheel", 7).await;
        ledger
    }

    #[tokio::test]
    async fn possible_quantity_reads_current_stock() {
        let ledger = stocked().await;
        assert_eq!(ledger.possible_quantity(&bike()).await, 3);

        ledger.adjust("wheel", -3).await;
        assert_eq!(ledger.possible_quantity(&bike()).await, 2);
    }

    #[tokio::test]
    async fn reserve_decrements_every_component() {
        let ledger = stocked().await;
        let remaining = ledger.reserve_bundle(&bike(), 2).await.unwrap();

        assert_eq!(remaining, 1);
        assert_eq!(ledger.available("frame").await, 3);
        assert_eq!(ledger.available("wheel").await, 3);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_ledger_untouched() {
        let ledger = stocked().await;
        let err = ledger.reserve_bundle(&bike(), 4).await.unwrap_err();

        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(ledger.available("frame").await, 5);
        assert_eq!(ledger.available("wheel").await, 7);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let ledger = stocked().await;
        let bundle = bike();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let ledger = ledger.clone();
            let bundle = bundle.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve_bundle(&bundle, 1).await.is_ok()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
        assert!(ledger.available("wheel").await >= 0);
    }

    #[tokio::test]
    async fn repeated_sku_entries_draw_on_the_same_stock() {
        let ledger = StockLedger::new();
        ledger.set_stock("bolt", 4).await;
        let bracket = BundleDefinition::new("bracket")
            .with_component("bolt", 2)
            .with_component("bolt", 2);

        assert_eq!(ledger.possible_quantity(&bracket).await, 1);
        assert_eq!(
            ledger.reserve_bundle(&bracket, 2).await,
            Err(InventoryError::InsufficientStock {
                requested: 2,
                available: 1
            })
        );
        assert_eq!(ledger.available("bolt").await, 4);

        assert_eq!(ledger.reserve_bundle(&bracket, 1).await, Ok(0));
        assert_eq!(ledger.available("bolt").await, 0);
    }

    #[tokio::test]
    async fn malformed_bundles_are_rejected() {
        let ledger = stocked().await;
        assert_eq!(
            ledger.reserve_bundle(&BundleDefinition::new("empty"), 1).await,
            Err(InventoryError::EmptyBundle)
        );

        let broken = BundleDefinition::new("broken").with_component("frame", 0);
        assert!(matches!(
            ledger.reserve_bundle(&broken, 1).await,
            Err(InventoryError::InvalidRequirement { .. })
        ));
    }
}
