//! HTTP surface of the fulfillment engine.
//!
//! Thin glue over the domain service, the bulk executor and the provider
//! sync coordinator, with structured logging (tracing) and Prometheus
//! metrics. Authorization is not handled here; the acting user is read
//! from the request body.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::FulfillmentService;
use event_store::EventStore;
use fulfillment_sync::{
    BulkOperationExecutor, ExternalSyncCoordinator, InMemoryFulfillmentProvider, SyncSettings,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub service: Arc<FulfillmentService<S>>,
    pub bulk: BulkOperationExecutor<S>,
    pub sync: ExternalSyncCoordinator<S, InMemoryFulfillmentProvider>,
    pub provider: InMemoryFulfillmentProvider,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::ingest::<S>))
        .route("/orders/legacy", post(routes::orders::import_legacy::<S>))
        .route("/orders/bulk", post(routes::bulk::execute::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/audit", get(routes::orders::audit::<S>))
        .route("/orders/{id}/transition", post(routes::orders::transition::<S>))
        .route("/orders/{id}/hold", post(routes::orders::hold::<S>))
        .route("/orders/{id}/release", post(routes::orders::release::<S>))
        .route("/bundles/availability", post(routes::bundles::availability))
        .route("/sync", post(routes::sync::run::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the service, executors and an in-memory provider over `event_store`.
pub fn create_default_state<S: EventStore + 'static>(
    event_store: S,
    settings: SyncSettings,
) -> Arc<AppState<S>> {
    let service = Arc::new(FulfillmentService::new(event_store));
    let provider = InMemoryFulfillmentProvider::new("in-memory-3pl");

    let bulk = BulkOperationExecutor::new(service.clone(), settings);
    let sync = ExternalSyncCoordinator::new(service.clone(), Arc::new(provider.clone()), settings);

    Arc::new(AppState {
        service,
        bulk,
        sync,
        provider,
    })
}
