use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{Actor, JobId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Metadata key holding the serialized [`Actor`].
pub const META_ACTOR: &str = "actor";

/// Metadata key holding the sync/bulk job id, when the change ran inside one.
pub const META_JOB_ID: &str = "job_id";

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event within its aggregate's stream.
///
/// Version 0 means "no events yet"; the first event is version 1 and each
/// subsequent event increments by one. Appends name the version they expect
/// to extend, which is how concurrent writers on one order are detected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The version of an aggregate with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The version carried by an aggregate's first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted event plus the metadata the audit trail needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The type of the event (e.g. "StateTransitioned", "OrderHeld").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g. "FulfillmentOrder").
    pub aggregate_type: String,

    /// The version of the aggregate after this event.
    pub version: Version,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata (actor, job id).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Returns the actor recorded on this event, if any.
    pub fn actor(&self) -> Option<Actor> {
        self.metadata
            .get(META_ACTOR)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Returns the job id recorded on this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        self.metadata
            .get(META_JOB_ID)
            .and_then(|value| value.as_str())
            .map(JobId::from_string)
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time is used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Records who caused the event.
    pub fn actor(mut self, actor: &Actor) -> Result<Self> {
        self.metadata
            .insert(META_ACTOR.to_string(), serde_json::to_value(actor)?);
        Ok(self)
    }

    /// Records the job the event was produced under.
    pub fn job_id(mut self, job_id: Option<&JobId>) -> Self {
        if let Some(job_id) = job_id {
            self.metadata.insert(
                META_JOB_ID.to_string(),
                serde_json::Value::String(job_id.to_string()),
            );
        }
        self
    }

    /// Adds an arbitrary metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, failing if a required field was never set.
    pub fn build(self) -> Result<EventEnvelope> {
        fn missing(field: &str) -> EventStoreError {
            EventStoreError::InvalidAppend(format!("{field} is required"))
        }

        Ok(EventEnvelope {
            event_id: EventId::new(),
            event_type: self.event_type.ok_or_else(|| missing("event_type"))?,
            aggregate_id: self.aggregate_id.ok_or_else(|| missing("aggregate_id"))?,
            aggregate_type: self
                .aggregate_type
                .ok_or_else(|| missing("aggregate_type"))?,
            version: self.version.ok_or_else(|| missing("version"))?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or_else(|| missing("payload"))?,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn builder_records_actor_and_job() {
        let aggregate_id = AggregateId::new();
        let job = JobId::from_string("sync-20261019-abcdef01");

        let envelope = EventEnvelope::builder()
            .event_type("OrderHeld")
            .aggregate_id(aggregate_id)
            .aggregate_type("FulfillmentOrder")
            .version(Version::first())
            .payload_raw(serde_json::json!({"reason": "address check"}))
            .actor(&Actor::operator("dana"))
            .unwrap()
            .job_id(Some(&job))
            .build()
            .unwrap();

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.actor(), Some(Actor::operator("dana")));
        assert_eq!(envelope.job_id(), Some(job));
    }

    #[test]
    fn job_id_is_optional() {
        let envelope = EventEnvelope::builder()
            .event_type("OrderIngested")
            .aggregate_id(AggregateId::new())
            .aggregate_type("FulfillmentOrder")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .job_id(None)
            .build()
            .unwrap();

        assert!(envelope.job_id().is_none());
        assert!(envelope.actor().is_none());
    }

    #[test]
    fn build_reports_missing_field() {
        let err = EventEnvelope::builder()
            .event_type("OrderIngested")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("aggregate_id is required"));
    }
}
