//! Fulfillment order aggregate, state machine, and hold/release control.

mod aggregate;
mod audit;
mod commands;
mod events;
mod locks;
pub mod migration;
mod service;
mod state;
mod value_objects;

pub use aggregate::FulfillmentOrder;
pub use audit::AuditRecord;
pub use commands::*;
pub use events::{
    FulfillmentEvent, HoldReleasedData, OrderHeldData, OrderImportedData, OrderIngestedData,
    StateTransitionedData, TrackingAttachedData,
};
pub use migration::{LabelMigration, MigrationReport, StateMigrationPolicy};
pub use service::{Advanced, FulfillmentService, Ingested, Reconciled};
pub use state::{FulfillmentState, ParseStateError};
pub use value_objects::{HoldInfo, TrackingInfo};

use thiserror::Error;

/// Logical failures of fulfillment commands.
///
/// None of these are retryable: the same command against the same state
/// fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    /// The requested state is not a legal next step.
    #[error("Invalid transition: cannot move from {current} to {requested}")]
    InvalidTransition {
        current: FulfillmentState,
        requested: FulfillmentState,
    },

    /// Forward progress is blocked until the hold is released.
    #[error("Order is on hold: {reason}")]
    OrderOnHold { reason: String },

    /// A legacy label that the migration table does not cover.
    #[error("Unmigratable legacy state label: {label:?}")]
    UnmigratableState { label: String },

    /// The command targets an order that was never created.
    #[error("Order has not been ingested")]
    NotIngested,

    /// The creating command ran against an existing order.
    #[error("Order already ingested")]
    AlreadyIngested,

    /// Orders must carry a platform reference.
    #[error("External order reference is required")]
    MissingExternalRef,

    /// Holds must say why.
    #[error("Hold reason is required")]
    EmptyHoldReason,

    /// Finished orders cannot be held.
    #[error("Cannot hold an order in terminal state {state}")]
    CannotHoldTerminal { state: FulfillmentState },

    /// Tracking only exists once the parcel is with a carrier.
    #[error("Tracking cannot be set in state {state}")]
    TrackingNotAllowed { state: FulfillmentState },
}
