//! Bulk operations and external provider synchronization.
//!
//! This crate provides:
//! - `BulkOperationExecutor`: hold, release or fulfill many orders, best
//!   effort per order
//! - `ExternalSyncCoordinator`: push local state to a fulfillment provider
//!   and reconcile its answer
//! - `SyncAuditLogger`: change lines and throttled batch summaries
//! - `BatchResult`: the per-batch tally both executors return
//!
//! Orders in a batch are processed concurrently up to a configured limit,
//! and cancellation is honoured between orders.

pub mod audit;
pub mod batch;
pub mod bulk;
pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod provider;
pub mod settings;

pub use audit::{
    AUDIT_TARGET, AuditSink, ChangeKind, MemoryAuditSink, StateChange, SyncAuditLogger,
    TracingAuditSink,
};
pub use batch::{BatchResult, FailedItem, ItemFailure, ItemOutcome};
pub use bulk::{BULK_SERVICE, BulkOperation, BulkOperationExecutor, BulkRun};
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use coordinator::{ExternalSyncCoordinator, SyncJob, SyncScope};
pub use error::{Result, SyncError};
pub use provider::{
    DesiredRemoteState, FulfillmentProvider, InMemoryFulfillmentProvider, ProviderResponse,
    RemoteSnapshot, decode_provider_payload,
};
pub use settings::SyncSettings;
