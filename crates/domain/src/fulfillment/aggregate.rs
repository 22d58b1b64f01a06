//! Fulfillment order aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, ExternalOrderRef};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    FulfillmentError, FulfillmentEvent, FulfillmentState, HoldInfo, StateMigrationPolicy,
    TrackingInfo,
};

/// One sales-channel order's physical fulfillment progress.
///
/// `state` is the single source of truth for progress. The hold is kept
/// beside it: a held order keeps its state and resumes from exactly there
/// once released.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentOrder {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    external_ref: Option<ExternalOrderRef>,

    channel: String,

    state: FulfillmentState,

    hold: Option<HoldInfo>,

    tracking: Option<TrackingInfo>,

    /// Label the order carried before migration, for imported orders.
    legacy_label: Option<String>,

    created_at: Option<DateTime<Utc>>,

    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for FulfillmentOrder {
    type Event = FulfillmentEvent;
    type Error = FulfillmentError;

    fn aggregate_type() -> &'static str {
        "FulfillmentOrder"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        self.updated_at = Some(event.occurred_at());
        match event {
            FulfillmentEvent::OrderIngested(data) => {
                self.id = Some(data.order_id);
                self.external_ref = Some(data.external_ref);
                self.channel = data.channel;
                self.state = FulfillmentState::Pending;
                self.created_at = Some(data.ingested_at);
            }
            FulfillmentEvent::OrderImported(data) => {
                self.id = Some(data.order_id);
                self.external_ref = Some(data.external_ref);
                self.channel = data.channel;
                self.state = data.state;
                self.legacy_label = Some(data.legacy_label);
                self.created_at = Some(data.imported_at);
            }
            FulfillmentEvent::StateTransitioned(data) => {
                self.state = data.to;
                if let Some(tracking) = data.tracking {
                    self.tracking = Some(tracking);
                }
            }
            FulfillmentEvent::OrderHeld(data) => {
                self.hold = Some(HoldInfo {
                    reason: data.reason,
                    held_at: data.held_at,
                });
            }
            FulfillmentEvent::HoldReleased(_) => {
                self.hold = None;
            }
            FulfillmentEvent::TrackingAttached(data) => {
                self.tracking = Some(data.tracking);
            }
        }
    }
}

// Query methods
impl FulfillmentOrder {
    /// Returns the platform-assigned reference.
    pub fn external_ref(&self) -> Option<&ExternalOrderRef> {
        self.external_ref.as_ref()
    }

    /// Returns the sales channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the current fulfillment state.
    pub fn state(&self) -> FulfillmentState {
        self.state
    }

    /// Returns true if a hold is active.
    pub fn is_held(&self) -> bool {
        self.hold.is_some()
    }

    /// Returns the active hold, if any.
    pub fn hold(&self) -> Option<&HoldInfo> {
        self.hold.as_ref()
    }

    /// Returns the reason of the active hold, if any.
    pub fn hold_reason(&self) -> Option<&str> {
        self.hold.as_ref().map(|h| h.reason.as_str())
    }

    /// Returns tracking, once shipped.
    pub fn tracking(&self) -> Option<&TrackingInfo> {
        self.tracking.as_ref()
    }

    /// Returns the pre-migration label of an imported order.
    pub fn legacy_label(&self) -> Option<&str> {
        self.legacy_label.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl FulfillmentOrder {
    /// Creates a new order in `PENDING`.
    pub fn ingest(
        &self,
        order_id: AggregateId,
        external_ref: ExternalOrderRef,
        channel: &str,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        if self.id.is_some() {
            return Err(FulfillmentError::AlreadyIngested);
        }
        if external_ref.is_empty() {
            return Err(FulfillmentError::MissingExternalRef);
        }

        Ok(vec![FulfillmentEvent::order_ingested(
            order_id,
            external_ref,
            channel,
        )])
    }

    /// Creates an order from a legacy record, in the state its label maps to.
    pub fn import_legacy(
        &self,
        order_id: AggregateId,
        external_ref: ExternalOrderRef,
        channel: &str,
        legacy_label: &str,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        if self.id.is_some() {
            return Err(FulfillmentError::AlreadyIngested);
        }
        if external_ref.is_empty() {
            return Err(FulfillmentError::MissingExternalRef);
        }

        let state = StateMigrationPolicy::migrate_label(legacy_label)?.state();
        Ok(vec![FulfillmentEvent::order_imported(
            order_id,
            external_ref,
            channel,
            legacy_label,
            state,
        )])
    }

    /// Moves the order one step along its path.
    ///
    /// A hold blocks every transition, whether or not it would be legal.
    pub fn transition(
        &self,
        target: FulfillmentState,
        tracking: Option<TrackingInfo>,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        self.ensure_ingested()?;

        if let Some(hold) = &self.hold {
            return Err(FulfillmentError::OrderOnHold {
                reason: hold.reason.clone(),
            });
        }

        if !self.state.can_transition_to(target) {
            return Err(FulfillmentError::InvalidTransition {
                current: self.state,
                requested: target,
            });
        }

        if tracking.is_some() && !target.is_shipping_capable() {
            return Err(FulfillmentError::TrackingNotAllowed { state: target });
        }

        Ok(vec![FulfillmentEvent::state_transitioned(
            self.state, target, tracking,
        )])
    }

    /// Places a hold. Holding an already-held order records nothing.
    pub fn hold_order(&self, reason: &str) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        self.ensure_ingested()?;

        if self.hold.is_some() {
            return Ok(vec![]);
        }

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FulfillmentError::EmptyHoldReason);
        }

        if self.state.is_terminal() {
            return Err(FulfillmentError::CannotHoldTerminal { state: self.state });
        }

        Ok(vec![FulfillmentEvent::order_held(reason, self.state)])
    }

    /// Lifts the hold. Releasing an order that is not held records nothing.
    ///
    /// Does not advance the state.
    pub fn release_hold(&self) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        self.ensure_ingested()?;

        match &self.hold {
            Some(hold) => Ok(vec![FulfillmentEvent::hold_released(
                hold.reason.clone(),
                self.state,
            )]),
            None => Ok(vec![]),
        }
    }

    /// Attaches or replaces tracking on a shipped order.
    pub fn attach_tracking(
        &self,
        tracking: TrackingInfo,
    ) -> Result<Vec<FulfillmentEvent>, FulfillmentError> {
        self.ensure_ingested()?;

        if !self.state.is_shipping_capable() {
            return Err(FulfillmentError::TrackingNotAllowed { state: self.state });
        }

        if self.tracking.as_ref() == Some(&tracking) {
            return Ok(vec![]);
        }

        Ok(vec![FulfillmentEvent::tracking_attached(
            tracking, self.state,
        )])
    }

    fn ensure_ingested(&self) -> Result<(), FulfillmentError> {
        if self.id.is_none() {
            return Err(FulfillmentError::NotIngested);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingested_order() -> FulfillmentOrder {
        let mut order = FulfillmentOrder::default();
        let events = order
            .ingest(AggregateId::new(), ExternalOrderRef::new("#1001"), "shopify")
            .unwrap();
        order.apply_events(events);
        order
    }

    fn order_in(state: FulfillmentState) -> FulfillmentOrder {
        let mut order = ingested_order();
        let path = FulfillmentState::Pending.path_to(state).unwrap();
        for step in path {
            let events = order.transition(step, None).unwrap();
            order.apply_events(events);
        }
        order
    }

    #[test]
    fn ingest_starts_pending() {
        let order = ingested_order();
        assert!(order.id().is_some());
        assert_eq!(order.state(), FulfillmentState::Pending);
        assert_eq!(order.channel(), "shopify");
        assert!(!order.is_held());
    }

    #[test]
    fn ingest_twice_fails() {
        let order = ingested_order();
        let result = order.ingest(AggregateId::new(), ExternalOrderRef::new("#1002"), "shopify");
        assert_eq!(result, Err(FulfillmentError::AlreadyIngested));
    }

    #[test]
    fn ingest_requires_reference() {
        let result = FulfillmentOrder::default().ingest(
            AggregateId::new(),
            ExternalOrderRef::new("  "),
            "shopify",
        );
        assert_eq!(result, Err(FulfillmentError::MissingExternalRef));
    }

    #[test]
    fn commands_on_missing_order_fail() {
        let order = FulfillmentOrder::default();
        assert_eq!(
            order.transition(FulfillmentState::Preparation, None),
            Err(FulfillmentError::NotIngested)
        );
        assert_eq!(order.hold_order("x"), Err(FulfillmentError::NotIngested));
        assert_eq!(order.release_hold(), Err(FulfillmentError::NotIngested));
    }

    #[test]
    fn transition_produces_one_event() {
        let order = ingested_order();
        let events = order
            .transition(FulfillmentState::Preparation, None)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].old_state(), Some(FulfillmentState::Pending));
        assert_eq!(events[0].new_state(), FulfillmentState::Preparation);
    }

    #[test]
    fn skipping_ahead_is_invalid() {
        let order = ingested_order();
        assert_eq!(
            order.transition(FulfillmentState::Locked, None),
            Err(FulfillmentError::InvalidTransition {
                current: FulfillmentState::Pending,
                requested: FulfillmentState::Locked,
            })
        );
    }

    #[test]
    fn hold_blocks_even_legal_transitions() {
        let mut order = order_in(FulfillmentState::Acknowledged);
        order.apply_events(order.hold_order("address check").unwrap());

        assert_eq!(
            order.transition(FulfillmentState::PickProcess, None),
            Err(FulfillmentError::OrderOnHold {
                reason: "address check".to_string()
            })
        );
        assert_eq!(order.state(), FulfillmentState::Acknowledged);
    }

    #[test]
    fn release_restores_eligibility_without_advancing() {
        let mut order = order_in(FulfillmentState::Acknowledged);
        order.apply_events(order.hold_order("address check").unwrap());
        order.apply_events(order.release_hold().unwrap());

        assert!(!order.is_held());
        assert_eq!(order.state(), FulfillmentState::Acknowledged);
        assert!(order.transition(FulfillmentState::PickProcess, None).is_ok());
    }

    #[test]
    fn hold_and_release_are_idempotent() {
        let mut order = ingested_order();
        order.apply_events(order.hold_order("fraud").unwrap());

        assert_eq!(order.hold_order("fraud").unwrap(), vec![]);
        assert_eq!(order.hold_order("another reason").unwrap(), vec![]);
        assert_eq!(order.hold_reason(), Some("fraud"));

        order.apply_events(order.release_hold().unwrap());
        assert_eq!(order.release_hold().unwrap(), vec![]);
    }

    #[test]
    fn hold_requires_reason() {
        let order = ingested_order();
        assert_eq!(order.hold_order("  "), Err(FulfillmentError::EmptyHoldReason));
    }

    #[test]
    fn terminal_orders_cannot_be_held() {
        let order = order_in(FulfillmentState::Delivered);
        assert_eq!(
            order.hold_order("late complaint"),
            Err(FulfillmentError::CannotHoldTerminal {
                state: FulfillmentState::Delivered
            })
        );
    }

    #[test]
    fn tracking_only_after_shipping() {
        let order = order_in(FulfillmentState::PickProcess);
        assert_eq!(
            order.attach_tracking(TrackingInfo::new("DHL", "JD0001")),
            Err(FulfillmentError::TrackingNotAllowed {
                state: FulfillmentState::PickProcess
            })
        );

        let locked = order_in(FulfillmentState::Locked);
        assert_eq!(
            locked.transition(
                FulfillmentState::Shipped,
                Some(TrackingInfo::new("DHL", "JD0001"))
            )
            .map(|events| events.len()),
            Ok(1)
        );
    }

    #[test]
    fn tracking_rides_along_with_shipping_transition() {
        let mut order = order_in(FulfillmentState::Locked);
        let tracking = TrackingInfo::new("UPS", "1Z999");
        order.apply_events(
            order
                .transition(FulfillmentState::Shipped, Some(tracking.clone()))
                .unwrap(),
        );
        assert_eq!(order.tracking(), Some(&tracking));
        assert_eq!(order.attach_tracking(tracking).unwrap(), vec![]);
    }

    #[test]
    fn import_legacy_maps_label() {
        let mut order = FulfillmentOrder::default();
        let events = order
            .import_legacy(
                AggregateId::new(),
                ExternalOrderRef::new("LEG-1"),
                "legacy",
                "ready_to_ship",
            )
            .unwrap();
        order.apply_events(events);
        assert_eq!(order.state(), FulfillmentState::Locked);
        assert_eq!(order.legacy_label(), Some("ready_to_ship"));
    }

    #[test]
    fn import_legacy_rejects_unknown_label() {
        let result = FulfillmentOrder::default().import_legacy(
            AggregateId::new(),
            ExternalOrderRef::new("LEG-2"),
            "legacy",
            "mystery",
        );
        assert_eq!(
            result,
            Err(FulfillmentError::UnmigratableState {
                label: "mystery".to_string()
            })
        );
    }
}
