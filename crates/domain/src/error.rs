//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::fulfillment::FulfillmentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The fulfillment state machine rejected the command.
    #[error("{0}")]
    Fulfillment(#[from] FulfillmentError),

    /// No order exists with this id.
    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    /// Concurrent writers kept winning the race for this order.
    #[error("Order {aggregate_id} kept changing underneath the command ({attempts} attempts)")]
    ConflictRetriesExhausted {
        aggregate_id: AggregateId,
        attempts: usize,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for infrastructure failures that must abort a whole
    /// batch rather than be recorded against a single order.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_outage())
    }

    /// Returns the state machine error, if this is one.
    pub fn as_fulfillment(&self) -> Option<&FulfillmentError> {
        match self {
            DomainError::Fulfillment(e) => Some(e),
            _ => None,
        }
    }
}
