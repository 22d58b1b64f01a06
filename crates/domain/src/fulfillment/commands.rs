//! Fulfillment order commands.

use common::{Actor, AggregateId, ExternalOrderRef, JobId};

use crate::command::{Command, CommandContext};

use super::{FulfillmentOrder, FulfillmentState, TrackingInfo};

/// Command to ingest an order from a sales channel.
#[derive(Debug, Clone)]
pub struct IngestOrder {
    pub external_ref: ExternalOrderRef,
    pub channel: String,
    pub context: CommandContext,
}

impl IngestOrder {
    pub fn new(
        external_ref: impl Into<ExternalOrderRef>,
        channel: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            external_ref: external_ref.into(),
            channel: channel.into(),
            context: CommandContext::new(actor),
        }
    }
}

/// Command to import an order from a legacy record.
#[derive(Debug, Clone)]
pub struct ImportLegacyOrder {
    pub external_ref: ExternalOrderRef,
    pub channel: String,
    /// Label exactly as stored on the legacy record.
    pub legacy_label: String,
    pub context: CommandContext,
}

impl ImportLegacyOrder {
    pub fn new(
        external_ref: impl Into<ExternalOrderRef>,
        channel: impl Into<String>,
        legacy_label: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            external_ref: external_ref.into(),
            channel: channel.into(),
            legacy_label: legacy_label.into(),
            context: CommandContext::new(actor),
        }
    }
}

/// Command to move an order one step along its path.
#[derive(Debug, Clone)]
pub struct TransitionOrder {
    pub order_id: AggregateId,
    pub target: FulfillmentState,
    /// Tracking to record with the move, only for shipping states.
    pub tracking: Option<TrackingInfo>,
    pub context: CommandContext,
}

impl TransitionOrder {
    pub fn new(order_id: AggregateId, target: FulfillmentState, actor: Actor) -> Self {
        Self {
            order_id,
            target,
            tracking: None,
            context: CommandContext::new(actor),
        }
    }

    pub fn with_tracking(mut self, tracking: TrackingInfo) -> Self {
        self.tracking = Some(tracking);
        self
    }

    /// Tags the recorded event with a bulk or sync job id.
    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.context = self.context.with_job(job_id);
        self
    }
}

impl Command for TransitionOrder {
    type Aggregate = FulfillmentOrder;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to place a hold on an order.
#[derive(Debug, Clone)]
pub struct HoldOrder {
    pub order_id: AggregateId,
    pub reason: String,
    pub context: CommandContext,
}

impl HoldOrder {
    pub fn new(order_id: AggregateId, reason: impl Into<String>, actor: Actor) -> Self {
        Self {
            order_id,
            reason: reason.into(),
            context: CommandContext::new(actor),
        }
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.context = self.context.with_job(job_id);
        self
    }
}

impl Command for HoldOrder {
    type Aggregate = FulfillmentOrder;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to lift the hold on an order.
#[derive(Debug, Clone)]
pub struct ReleaseOrder {
    pub order_id: AggregateId,
    pub context: CommandContext,
}

impl ReleaseOrder {
    pub fn new(order_id: AggregateId, actor: Actor) -> Self {
        Self {
            order_id,
            context: CommandContext::new(actor),
        }
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.context = self.context.with_job(job_id);
        self
    }
}

impl Command for ReleaseOrder {
    type Aggregate = FulfillmentOrder;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to attach or replace tracking on a shipped order.
#[derive(Debug, Clone)]
pub struct AttachTracking {
    pub order_id: AggregateId,
    pub tracking: TrackingInfo,
    pub context: CommandContext,
}

impl AttachTracking {
    pub fn new(order_id: AggregateId, tracking: TrackingInfo, actor: Actor) -> Self {
        Self {
            order_id,
            tracking,
            context: CommandContext::new(actor),
        }
    }
}

impl Command for AttachTracking {
    type Aggregate = FulfillmentOrder;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
