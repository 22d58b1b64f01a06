//! Bulk hold, release and fulfill over operator-selected orders.

use std::sync::Arc;

use common::{Actor, AggregateId, JobId, generate_job_id};
use domain::{
    DomainError, FulfillmentService, FulfillmentState, HoldOrder, ReleaseOrder, TransitionOrder,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditSink, StateChange, SyncAuditLogger, TracingAuditSink};
use crate::batch::{BatchResult, ItemOutcome, classify, fan_out};
use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::settings::SyncSettings;

/// Service name on bulk summary lines.
pub const BULK_SERVICE: &str = "bulk-operations";

/// What to do to every order in a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BulkOperation {
    Hold { reason: String },
    Release,
    /// Move each order one step to `target`.
    Fulfill { target: FulfillmentState },
}

impl BulkOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BulkOperation::Hold { .. } => "hold",
            BulkOperation::Release => "release",
            BulkOperation::Fulfill { .. } => "fulfill",
        }
    }

    /// Job id prefix for runs of this operation.
    pub fn job_prefix(&self) -> String {
        format!("bulk-{}", self.name())
    }
}

/// Outcome of one bulk run.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRun {
    pub job_id: JobId,
    pub operation: BulkOperation,
    pub result: BatchResult,
}

/// Applies one operation to many orders, best effort and per order.
///
/// A failing order never blocks or rolls back the others. Orders already
/// in the requested condition count as unchanged. Only a store outage
/// aborts the run.
pub struct BulkOperationExecutor<S: EventStore> {
    service: Arc<FulfillmentService<S>>,
    settings: SyncSettings,
    sink: Arc<dyn AuditSink>,
}

impl<S: EventStore> BulkOperationExecutor<S> {
    pub fn new(service: Arc<FulfillmentService<S>>, settings: SyncSettings) -> Self {
        Self {
            service,
            settings,
            sink: Arc::new(TracingAuditSink),
        }
    }

    /// Sends audit lines to `sink` instead of tracing.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs `operation` over `order_ids` in the order supplied.
    #[tracing::instrument(skip(self, order_ids, cancel), fields(operation = operation.name(), orders = order_ids.len()))]
    pub async fn execute(
        &self,
        operation: BulkOperation,
        order_ids: Vec<AggregateId>,
        actor: Actor,
        cancel: &CancelSignal,
    ) -> Result<BulkRun> {
        let job_id = generate_job_id(&operation.job_prefix());
        let mut audit = SyncAuditLogger::new(self.sink.clone()).for_job(job_id.clone());
        audit.start_batch();
        metrics::counter!("bulk_operations_total", "operation" => operation.name()).increment(1);
        tracing::info!(%job_id, "bulk operation started");

        let audit = &audit;
        let operation_ref = &operation;
        let actor = &actor;
        let job = &job_id;
        let result = fan_out(
            order_ids,
            self.settings.concurrency,
            cancel,
            |order_id| async move {
                match self.apply(operation_ref, order_id, actor, job, audit).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) => classify(e),
                }
            },
        )
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%job_id, error = %e, "bulk operation aborted");
                return Err(e);
            }
        };

        record_item_metrics(&result);
        audit.log_batch_summary(BULK_SERVICE, &result, true);

        Ok(BulkRun {
            job_id,
            operation,
            result,
        })
    }

    async fn apply(
        &self,
        operation: &BulkOperation,
        order_id: AggregateId,
        actor: &Actor,
        job_id: &JobId,
        audit: &SyncAuditLogger,
    ) -> std::result::Result<ItemOutcome, DomainError> {
        match operation {
            BulkOperation::Hold { reason } => {
                let result = self
                    .service
                    .hold(HoldOrder::new(order_id, reason.clone(), actor.clone()).with_job(job_id.clone()))
                    .await?;
                if !result.changed() {
                    return Ok(ItemOutcome::Unchanged);
                }
                audit.log_state_change(&StateChange::held(
                    order_id,
                    result.aggregate.state(),
                    reason.clone(),
                ));
                Ok(ItemOutcome::Updated)
            }
            BulkOperation::Release => {
                let result = self
                    .service
                    .release(ReleaseOrder::new(order_id, actor.clone()).with_job(job_id.clone()))
                    .await?;
                if !result.changed() {
                    return Ok(ItemOutcome::Unchanged);
                }
                audit.log_state_change(&StateChange::released(order_id, result.aggregate.state()));
                Ok(ItemOutcome::Updated)
            }
            BulkOperation::Fulfill { target } => {
                let advanced = self
                    .service
                    .advance_to(
                        TransitionOrder::new(order_id, *target, actor.clone())
                            .with_job(job_id.clone()),
                    )
                    .await?;
                if !advanced.changed() {
                    return Ok(ItemOutcome::Unchanged);
                }
                audit.log_state_change(&StateChange::transition(order_id, advanced.from, *target));
                Ok(ItemOutcome::Updated)
            }
        }
    }
}

fn record_item_metrics(result: &BatchResult) {
    for (outcome, count) in [
        ("updated", result.updated),
        ("unchanged", result.unchanged),
        ("failed", result.failed),
        ("skipped", result.skipped),
    ] {
        metrics::counter!("bulk_items_total", "outcome" => outcome).increment(count as u64);
    }
}
