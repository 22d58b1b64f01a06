//! Operator-triggered provider syncs.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use fulfillment_sync::{CancelSignal, SyncJob, SyncScope};
use serde::Deserialize;

use super::orders::parse_aggregate_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SyncRequest {
    pub scope: SyncScope,
    pub order_ids: Vec<String>,
}

/// POST /sync — reconcile orders with the fulfillment provider.
#[tracing::instrument(skip(state, req), fields(scope = %req.scope, orders = req.order_ids.len()))]
pub async fn run<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncJob>, ApiError> {
    let order_ids = req
        .order_ids
        .iter()
        .map(|id| parse_aggregate_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    let job = state
        .sync
        .run(req.scope, order_ids, &CancelSignal::never())
        .await?;
    Ok(Json(job))
}
