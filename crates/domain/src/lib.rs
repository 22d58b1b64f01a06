//! Domain layer for the fulfillment engine.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler with optimistic-concurrency retry
//! - The fulfillment order state machine, hold/release control and
//!   legacy-label migration
//! - Bundle availability math and the stock ledger

pub mod aggregate;
pub mod bundle;
pub mod command;
pub mod error;
pub mod fulfillment;
pub mod inventory;

pub use aggregate::{Aggregate, DomainEvent};
pub use bundle::{BundleComponent, calculate_possible_quantity, limiting_component};
pub use command::{Command, CommandContext, CommandHandler, CommandResult};
pub use error::DomainError;
pub use fulfillment::{
    Advanced, AttachTracking, AuditRecord, FulfillmentError, FulfillmentEvent, FulfillmentOrder,
    FulfillmentService, FulfillmentState, HoldInfo, HoldOrder, ImportLegacyOrder, IngestOrder,
    Ingested, LabelMigration, MigrationReport, ParseStateError, Reconciled, ReleaseOrder,
    StateMigrationPolicy, TrackingInfo, TransitionOrder,
};
pub use inventory::{BundleDefinition, InventoryError, StockLedger};
