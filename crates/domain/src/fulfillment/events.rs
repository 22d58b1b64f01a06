//! Fulfillment order events.
//!
//! Each event is exactly one audit record. Holds and releases carry the
//! state the order was in so the trail reads without replay.

use chrono::{DateTime, Utc};
use common::{AggregateId, ExternalOrderRef};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{FulfillmentState, TrackingInfo};

/// Events that can occur on a fulfillment order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FulfillmentEvent {
    /// Order arrived from a sales channel.
    OrderIngested(OrderIngestedData),

    /// Order was migrated from a legacy record.
    OrderImported(OrderImportedData),

    /// Order moved one step along the state path.
    StateTransitioned(StateTransitionedData),

    /// A hold was placed.
    OrderHeld(OrderHeldData),

    /// The hold was lifted.
    HoldReleased(HoldReleasedData),

    /// Tracking was attached or replaced after shipping.
    TrackingAttached(TrackingAttachedData),
}

impl DomainEvent for FulfillmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FulfillmentEvent::OrderIngested(_) => "OrderIngested",
            FulfillmentEvent::OrderImported(_) => "OrderImported",
            FulfillmentEvent::StateTransitioned(_) => "StateTransitioned",
            FulfillmentEvent::OrderHeld(_) => "OrderHeld",
            FulfillmentEvent::HoldReleased(_) => "HoldReleased",
            FulfillmentEvent::TrackingAttached(_) => "TrackingAttached",
        }
    }
}

impl FulfillmentEvent {
    /// Event types that create an order; used to look up external refs.
    pub const CREATION_TYPES: [&'static str; 2] = ["OrderIngested", "OrderImported"];

    /// The order's state before this event, if it existed.
    pub fn old_state(&self) -> Option<FulfillmentState> {
        match self {
            FulfillmentEvent::OrderIngested(_) | FulfillmentEvent::OrderImported(_) => None,
            FulfillmentEvent::StateTransitioned(data) => Some(data.from),
            FulfillmentEvent::OrderHeld(data) => Some(data.state),
            FulfillmentEvent::HoldReleased(data) => Some(data.state),
            FulfillmentEvent::TrackingAttached(data) => Some(data.state),
        }
    }

    /// The order's state after this event.
    pub fn new_state(&self) -> FulfillmentState {
        match self {
            FulfillmentEvent::OrderIngested(_) => FulfillmentState::Pending,
            FulfillmentEvent::OrderImported(data) => data.state,
            FulfillmentEvent::StateTransitioned(data) => data.to,
            FulfillmentEvent::OrderHeld(data) => data.state,
            FulfillmentEvent::HoldReleased(data) => data.state,
            FulfillmentEvent::TrackingAttached(data) => data.state,
        }
    }

    /// When the change happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FulfillmentEvent::OrderIngested(data) => data.ingested_at,
            FulfillmentEvent::OrderImported(data) => data.imported_at,
            FulfillmentEvent::StateTransitioned(data) => data.transitioned_at,
            FulfillmentEvent::OrderHeld(data) => data.held_at,
            FulfillmentEvent::HoldReleased(data) => data.released_at,
            FulfillmentEvent::TrackingAttached(data) => data.attached_at,
        }
    }

    /// The external reference, for creation events.
    pub fn external_ref(&self) -> Option<&ExternalOrderRef> {
        match self {
            FulfillmentEvent::OrderIngested(data) => Some(&data.external_ref),
            FulfillmentEvent::OrderImported(data) => Some(&data.external_ref),
            _ => None,
        }
    }
}

/// Data for OrderIngested event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIngestedData {
    pub order_id: AggregateId,
    pub external_ref: ExternalOrderRef,
    /// Sales channel the order came from, e.g. "shopify".
    pub channel: String,
    pub ingested_at: DateTime<Utc>,
}

/// Data for OrderImported event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderImportedData {
    pub order_id: AggregateId,
    pub external_ref: ExternalOrderRef,
    pub channel: String,
    /// Label as found on the legacy record.
    pub legacy_label: String,
    /// Canonical state the label mapped to.
    pub state: FulfillmentState,
    pub imported_at: DateTime<Utc>,
}

/// Data for StateTransitioned event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionedData {
    pub from: FulfillmentState,
    pub to: FulfillmentState,
    /// Tracking supplied together with the move into a shipping state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingInfo>,
    pub transitioned_at: DateTime<Utc>,
}

/// Data for OrderHeld event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHeldData {
    pub reason: String,
    pub state: FulfillmentState,
    pub held_at: DateTime<Utc>,
}

/// Data for HoldReleased event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldReleasedData {
    /// Reason of the hold that was lifted.
    pub previous_reason: String,
    pub state: FulfillmentState,
    pub released_at: DateTime<Utc>,
}

/// Data for TrackingAttached event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingAttachedData {
    pub tracking: TrackingInfo,
    pub state: FulfillmentState,
    pub attached_at: DateTime<Utc>,
}

// Factory methods
impl FulfillmentEvent {
    pub fn order_ingested(
        order_id: AggregateId,
        external_ref: ExternalOrderRef,
        channel: impl Into<String>,
    ) -> Self {
        FulfillmentEvent::OrderIngested(OrderIngestedData {
            order_id,
            external_ref,
            channel: channel.into(),
            ingested_at: Utc::now(),
        })
    }

    pub fn order_imported(
        order_id: AggregateId,
        external_ref: ExternalOrderRef,
        channel: impl Into<String>,
        legacy_label: impl Into<String>,
        state: FulfillmentState,
    ) -> Self {
        FulfillmentEvent::OrderImported(OrderImportedData {
            order_id,
            external_ref,
            channel: channel.into(),
            legacy_label: legacy_label.into(),
            state,
            imported_at: Utc::now(),
        })
    }

    pub fn state_transitioned(
        from: FulfillmentState,
        to: FulfillmentState,
        tracking: Option<TrackingInfo>,
    ) -> Self {
        FulfillmentEvent::StateTransitioned(StateTransitionedData {
            from,
            to,
            tracking,
            transitioned_at: Utc::now(),
        })
    }

    pub fn order_held(reason: impl Into<String>, state: FulfillmentState) -> Self {
        FulfillmentEvent::OrderHeld(OrderHeldData {
            reason: reason.into(),
            state,
            held_at: Utc::now(),
        })
    }

    pub fn hold_released(previous_reason: impl Into<String>, state: FulfillmentState) -> Self {
        FulfillmentEvent::HoldReleased(HoldReleasedData {
            previous_reason: previous_reason.into(),
            state,
            released_at: Utc::now(),
        })
    }

    pub fn tracking_attached(tracking: TrackingInfo, state: FulfillmentState) -> Self {
        FulfillmentEvent::TrackingAttached(TrackingAttachedData {
            tracking,
            state,
            attached_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = FulfillmentEvent::order_held("fraud review", FulfillmentState::Locked);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderHeld");
        assert_eq!(json["data"]["reason"], "fraud review");
        assert_eq!(json["data"]["state"], "LOCKED");

        let back: FulfillmentEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn old_and_new_state() {
        let created = FulfillmentEvent::order_ingested(
            AggregateId::new(),
            ExternalOrderRef::new("#1001"),
            "shopify",
        );
        assert_eq!(created.old_state(), None);
        assert_eq!(created.new_state(), FulfillmentState::Pending);

        let moved = FulfillmentEvent::state_transitioned(
            FulfillmentState::Locked,
            FulfillmentState::Shipped,
            None,
        );
        assert_eq!(moved.old_state(), Some(FulfillmentState::Locked));
        assert_eq!(moved.new_state(), FulfillmentState::Shipped);

        let held = FulfillmentEvent::order_held("x", FulfillmentState::Preparation);
        assert_eq!(held.old_state(), Some(held.new_state()));
    }

    #[test]
    fn creation_events_expose_external_ref() {
        let event = FulfillmentEvent::order_imported(
            AggregateId::new(),
            ExternalOrderRef::new("LEG-9"),
            "legacy",
            "packed",
            FulfillmentState::Locked,
        );
        assert_eq!(event.external_ref().map(|r| r.as_str()), Some("LEG-9"));
        assert!(FulfillmentEvent::CREATION_TYPES.contains(&event.event_type()));
    }
}
