//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, FulfillmentError};
use fulfillment_sync::SyncError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// A bulk or sync batch was aborted.
    Sync(SyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Sync(err) => {
                tracing::error!(error = %err, "batch aborted");
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    if err.is_fatal() {
        tracing::error!(error = %err, "store unavailable");
        return (StatusCode::SERVICE_UNAVAILABLE, err.to_string());
    }

    let status = match &err {
        DomainError::Fulfillment(fulfillment_err) => match fulfillment_err {
            FulfillmentError::InvalidTransition { .. } => StatusCode::CONFLICT,
            FulfillmentError::OrderOnHold { .. } => StatusCode::LOCKED,
            FulfillmentError::UnmigratableState { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FulfillmentError::NotIngested => StatusCode::NOT_FOUND,
            FulfillmentError::AlreadyIngested
            | FulfillmentError::CannotHoldTerminal { .. }
            | FulfillmentError::TrackingNotAllowed { .. } => StatusCode::CONFLICT,
            FulfillmentError::MissingExternalRef | FulfillmentError::EmptyHoldReason => {
                StatusCode::BAD_REQUEST
            }
        },
        DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::ConflictRetriesExhausted { .. } => StatusCode::CONFLICT,
        _ => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError::Sync(err)
    }
}

#[cfg(test)]
mod tests {
    use common::AggregateId;
    use domain::FulfillmentState;
    use event_store::EventStoreError;

    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn state_machine_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(
                FulfillmentError::InvalidTransition {
                    current: FulfillmentState::Pending,
                    requested: FulfillmentState::Shipped,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(
                FulfillmentError::OrderOnHold {
                    reason: "fraud".to_string()
                }
                .into()
            ),
            StatusCode::LOCKED
        );
        assert_eq!(
            status_of(
                FulfillmentError::UnmigratableState {
                    label: "???".to_string()
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DomainError::OrderNotFound(AggregateId::new())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn outages_are_service_unavailable() {
        let err = DomainError::EventStore(EventStoreError::Unavailable("down".to_string()));
        assert_eq!(status_of(err), StatusCode::SERVICE_UNAVAILABLE);
    }
}
