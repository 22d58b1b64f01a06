//! Bulk hold, release and fulfill.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::Actor;
use event_store::EventStore;
use fulfillment_sync::{BulkOperation, BulkRun, CancelSignal};
use serde::Deserialize;

use super::orders::parse_aggregate_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct BulkRequest {
    pub operation: BulkOperation,
    pub order_ids: Vec<String>,
    pub actor: Actor,
}

/// POST /orders/bulk — apply one operation to many orders.
///
/// Per-order failures are reported in the result body; only a store
/// outage fails the request.
#[tracing::instrument(skip(state, req), fields(operation = req.operation.name(), orders = req.order_ids.len()))]
pub async fn execute<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkRun>, ApiError> {
    let order_ids = req
        .order_ids
        .iter()
        .map(|id| parse_aggregate_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    let run = state
        .bulk
        .execute(req.operation, order_ids, req.actor, &CancelSignal::never())
        .await?;
    Ok(Json(run))
}
