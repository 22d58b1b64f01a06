//! Order ingest, lifecycle and audit endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Actor, AggregateId};
use domain::{
    Aggregate, AuditRecord, FulfillmentOrder, FulfillmentState, HoldOrder, ImportLegacyOrder,
    IngestOrder, ReleaseOrder, TrackingInfo, TransitionOrder,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct IngestRequest {
    pub external_ref: String,
    pub channel: String,
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct LegacyImportRequest {
    pub external_ref: String,
    pub channel: String,
    pub legacy_label: String,
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub target: FulfillmentState,
    pub actor: Actor,
    #[serde(default)]
    pub tracking: Option<TrackingInfo>,
}

#[derive(Deserialize)]
pub struct HoldRequest {
    pub reason: String,
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct ReleaseRequest {
    pub actor: Actor,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub external_ref: Option<String>,
    pub channel: String,
    pub state: FulfillmentState,
    pub held: bool,
    pub hold_reason: Option<String>,
    pub tracking: Option<TrackingInfo>,
    pub legacy_label: Option<String>,
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    fn from_order(order: &FulfillmentOrder) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            external_ref: order.external_ref().map(|r| r.to_string()),
            channel: order.channel().to_string(),
            state: order.state(),
            held: order.is_held(),
            hold_reason: order.hold_reason().map(String::from),
            tracking: order.tracking().cloned(),
            legacy_label: order.legacy_label().map(String::from),
            version: order.version().as_i64(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub order: OrderResponse,
    /// False when the order was already in the requested condition.
    pub changed: bool,
}

// -- Handlers --

/// POST /orders — ingest an order from a sales channel.
///
/// Returns 201 for a new order and 200 when the external reference was
/// already known.
#[tracing::instrument(skip(state, req), fields(external_ref = %req.external_ref))]
pub async fn ingest<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let ingested = state
        .service
        .ingest_order(IngestOrder::new(req.external_ref, req.channel, req.actor))
        .await?;

    let status = if ingested.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(OrderResponse::from_order(&ingested.order))))
}

/// POST /orders/legacy — import an order carrying a legacy state label.
#[tracing::instrument(skip(state, req), fields(external_ref = %req.external_ref))]
pub async fn import_legacy<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<LegacyImportRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let imported = state
        .service
        .import_legacy_order(ImportLegacyOrder::new(
            req.external_ref,
            req.channel,
            req.legacy_label,
            req.actor,
        ))
        .await?;

    let status = if imported.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(OrderResponse::from_order(&imported.order))))
}

/// GET /orders/:id — current view of an order.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .service
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /orders/:id/audit — every recorded change to an order, oldest first.
#[tracing::instrument(skip(state))]
pub async fn audit<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let trail = state.service.audit_trail(order_id).await?;
    Ok(Json(trail))
}

/// POST /orders/:id/transition — move an order one step.
#[tracing::instrument(skip(state, req), fields(target = %req.target))]
pub async fn transition<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let mut cmd = TransitionOrder::new(order_id, req.target, req.actor);
    if let Some(tracking) = req.tracking {
        cmd = cmd.with_tracking(tracking);
    }

    let result = state.service.transition(cmd).await?;
    Ok(Json(CommandResponse {
        changed: result.changed(),
        order: OrderResponse::from_order(&result.aggregate),
    }))
}

/// POST /orders/:id/hold — put an order on hold.
#[tracing::instrument(skip(state, req))]
pub async fn hold<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let result = state
        .service
        .hold(HoldOrder::new(order_id, req.reason, req.actor))
        .await?;

    Ok(Json(CommandResponse {
        changed: result.changed(),
        order: OrderResponse::from_order(&result.aggregate),
    }))
}

/// POST /orders/:id/release — lift a hold.
#[tracing::instrument(skip(state, req))]
pub async fn release<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let result = state
        .service
        .release(ReleaseOrder::new(order_id, req.actor))
        .await?;

    Ok(Json(CommandResponse {
        changed: result.changed(),
        order: OrderResponse::from_order(&result.aggregate),
    }))
}

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}
