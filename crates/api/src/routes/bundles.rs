//! Bundle availability.

use axum::Json;
use domain::{BundleComponent, calculate_possible_quantity, limiting_component};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ComponentRequest {
    #[serde(default)]
    pub sku: Option<String>,
    pub required_quantity: i64,
    pub available_stock: i64,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub components: Vec<ComponentRequest>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub possible_quantity: u64,
    /// SKU of the component that caps the quantity, when it has one.
    pub limiting_sku: Option<String>,
}

/// POST /bundles/availability — how many complete bundles current stock supports.
pub async fn availability(Json(req): Json<AvailabilityRequest>) -> Json<AvailabilityResponse> {
    let components: Vec<BundleComponent> = req
        .components
        .into_iter()
        .map(|c| {
            let component = BundleComponent::new(c.required_quantity, c.available_stock);
            match c.sku {
                Some(sku) => component.with_sku(sku),
                None => component,
            }
        })
        .collect();

    Json(AvailabilityResponse {
        possible_quantity: calculate_possible_quantity(&components),
        limiting_sku: limiting_component(&components).and_then(|c| c.sku.clone()),
    })
}
