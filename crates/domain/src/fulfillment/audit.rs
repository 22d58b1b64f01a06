//! Audit trail entries derived from recorded events.

use chrono::{DateTime, Utc};
use common::{Actor, JobId};
use event_store::{EventEnvelope, Version};
use serde::Serialize;

use super::{FulfillmentEvent, FulfillmentState};

/// One entry of an order's audit trail.
///
/// Every recorded event yields exactly one record, carrying the state and
/// hold flag as they were right after the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub version: Version,
    pub event_type: String,
    pub old_state: Option<FulfillmentState>,
    pub new_state: FulfillmentState,
    pub held: bool,
    pub hold_reason: Option<String>,
    pub actor: Option<Actor>,
    pub job_id: Option<JobId>,
    pub timestamp: DateTime<Utc>,
    pub event: FulfillmentEvent,
}

impl AuditRecord {
    pub(crate) fn new(
        envelope: &EventEnvelope,
        event: FulfillmentEvent,
        hold_reason: Option<String>,
    ) -> Self {
        Self {
            version: envelope.version,
            event_type: envelope.event_type.clone(),
            old_state: event.old_state(),
            new_state: event.new_state(),
            held: hold_reason.is_some(),
            hold_reason,
            actor: envelope.actor(),
            job_id: envelope.job_id(),
            timestamp: envelope.timestamp,
            event,
        }
    }
}
