//! Fulfillment service: the entry point for every order state change.

use std::collections::HashMap;

use common::{AggregateId, ExternalOrderRef};
use event_store::EventStore;
use tokio::sync::{Mutex, RwLock};

use crate::aggregate::Aggregate;
use crate::command::{CommandContext, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::locks::OrderLocks;
use super::{
    AttachTracking, AuditRecord, FulfillmentError, FulfillmentEvent, FulfillmentOrder,
    FulfillmentState, HoldOrder, ImportLegacyOrder, IngestOrder, ReleaseOrder, TrackingInfo,
    TransitionOrder,
};

/// Outcome of an ingest or import.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub order: FulfillmentOrder,
    /// False when the external reference was already known.
    pub created: bool,
}

/// Outcome of moving an order to a target unless it is already there.
#[derive(Debug, Clone)]
pub struct Advanced {
    pub order: FulfillmentOrder,
    /// State the order was in when its lock was taken.
    pub from: FulfillmentState,
}

impl Advanced {
    pub fn changed(&self) -> bool {
        self.order.state() != self.from
    }
}

/// Outcome of reconciling an order toward an externally reported state.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub order: FulfillmentOrder,
    /// States entered, in order. Empty when nothing changed.
    pub steps: Vec<FulfillmentState>,
}

impl Reconciled {
    pub fn changed(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// External references seen by this service.
///
/// Creation events are scanned from the store once, on first lookup. After
/// that every ingest and import through this service records its own ref,
/// so the map answers on its own.
#[derive(Debug, Default)]
struct RefIndex {
    loaded: bool,
    ids: HashMap<ExternalOrderRef, AggregateId>,
}

/// Service for managing fulfillment orders.
///
/// All writes to one order are serialized through a per-order lock, so a
/// hold and a transition racing on the same order are decided one after
/// the other against fresh state. Writes to different orders run in
/// parallel.
pub struct FulfillmentService<S: EventStore> {
    handler: CommandHandler<S, FulfillmentOrder>,
    locks: OrderLocks,
    refs: RwLock<RefIndex>,
    ingest_lock: Mutex<()>,
}

impl<S: EventStore> FulfillmentService<S> {
    /// Creates a new service over the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
            locks: OrderLocks::new(),
            refs: RwLock::new(RefIndex::default()),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, FulfillmentOrder> {
        &self.handler
    }

    /// Ingests an order from a sales channel.
    ///
    /// An already known external reference returns the existing order
    /// untouched.
    #[tracing::instrument(skip(self), fields(external_ref = %cmd.external_ref))]
    pub async fn ingest_order(&self, cmd: IngestOrder) -> Result<Ingested, DomainError> {
        let _guard = self.ingest_lock.lock().await;

        if let Some(existing) = self.existing_by_ref(&cmd.external_ref).await? {
            return Ok(existing);
        }

        let order_id = AggregateId::new();
        let external_ref = cmd.external_ref.clone();
        let channel = cmd.channel.clone();
        let result = self
            .handler
            .execute(order_id, &cmd.context, |order| {
                order.ingest(order_id, external_ref.clone(), &channel)
            })
            .await?;

        self.refs.write().await.ids.insert(cmd.external_ref, order_id);
        tracing::info!(%order_id, "order ingested");

        Ok(Ingested {
            order: result.aggregate,
            created: true,
        })
    }

    /// Imports an order from a legacy record, mapping its state label.
    ///
    /// An unknown label fails with `UnmigratableState` and nothing is
    /// written.
    #[tracing::instrument(skip(self), fields(external_ref = %cmd.external_ref))]
    pub async fn import_legacy_order(
        &self,
        cmd: ImportLegacyOrder,
    ) -> Result<Ingested, DomainError> {
        let _guard = self.ingest_lock.lock().await;

        if let Some(existing) = self.existing_by_ref(&cmd.external_ref).await? {
            return Ok(existing);
        }

        let order_id = AggregateId::new();
        let external_ref = cmd.external_ref.clone();
        let result = self
            .handler
            .execute(order_id, &cmd.context, |order| {
                order.import_legacy(order_id, external_ref.clone(), &cmd.channel, &cmd.legacy_label)
            })
            .await?;

        self.refs.write().await.ids.insert(cmd.external_ref, order_id);
        tracing::info!(
            %order_id,
            legacy_label = %cmd.legacy_label,
            state = %result.aggregate.state(),
            "legacy order imported"
        );

        Ok(Ingested {
            order: result.aggregate,
            created: true,
        })
    }

    /// Moves an order one step along its path.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, target = %cmd.target))]
    pub async fn transition(
        &self,
        cmd: TransitionOrder,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        let _guard = self.locks.acquire(cmd.order_id).await;
        self.transition_locked(cmd.order_id, cmd.target, cmd.tracking, &cmd.context)
            .await
    }

    /// Moves an order one step to `cmd.target`, or leaves it alone when it
    /// is already there. The check and the step run under the same lock.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id, target = %cmd.target))]
    pub async fn advance_to(&self, cmd: TransitionOrder) -> Result<Advanced, DomainError> {
        let _guard = self.locks.acquire(cmd.order_id).await;

        let order = self
            .handler
            .load_existing(cmd.order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(cmd.order_id))?;
        let from = order.state();
        if from == cmd.target {
            return Ok(Advanced { order, from });
        }

        let result = self
            .transition_locked(cmd.order_id, cmd.target, cmd.tracking, &cmd.context)
            .await?;
        Ok(Advanced {
            order: result.aggregate,
            from,
        })
    }

    /// Places a hold. Holding an already-held order is unchanged.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn hold(
        &self,
        cmd: HoldOrder,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        let _guard = self.locks.acquire(cmd.order_id).await;
        let result = self
            .handler
            .execute(cmd.order_id, &cmd.context, |order| {
                order.hold_order(&cmd.reason)
            })
            .await
            .map_err(not_found(cmd.order_id))?;

        if result.changed() {
            metrics::counter!("fulfillment_holds_total").increment(1);
            tracing::info!(reason = %cmd.reason, "order held");
        }
        Ok(result)
    }

    /// Lifts a hold without advancing the order.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn release(
        &self,
        cmd: ReleaseOrder,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        let _guard = self.locks.acquire(cmd.order_id).await;
        let result = self
            .handler
            .execute(cmd.order_id, &cmd.context, |order| order.release_hold())
            .await
            .map_err(not_found(cmd.order_id))?;

        if result.changed() {
            metrics::counter!("fulfillment_releases_total").increment(1);
            tracing::info!("hold released");
        }
        Ok(result)
    }

    /// Attaches tracking to a shipped order.
    #[tracing::instrument(skip(self), fields(order_id = %cmd.order_id))]
    pub async fn attach_tracking(
        &self,
        cmd: AttachTracking,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        let _guard = self.locks.acquire(cmd.order_id).await;
        self.handler
            .execute(cmd.order_id, &cmd.context, |order| {
                order.attach_tracking(cmd.tracking.clone())
            })
            .await
            .map_err(not_found(cmd.order_id))
    }

    /// Brings an order up to a state reported by an external system.
    ///
    /// A target ahead of the local state is reached one legal step at a
    /// time, each step recorded with `context`. A target equal to or
    /// behind the local state changes nothing. A target on another branch
    /// of the path is an `InvalidTransition`. Tracking, if given, rides on
    /// the first step into a shipping state.
    #[tracing::instrument(skip(self, tracking, context))]
    pub async fn reconcile_to(
        &self,
        order_id: AggregateId,
        target: FulfillmentState,
        tracking: Option<TrackingInfo>,
        context: &CommandContext,
    ) -> Result<Reconciled, DomainError> {
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self
            .handler
            .load_existing(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        let current = order.state();
        let path = match current.path_to(target) {
            Some(path) if !path.is_empty() => path,
            // Already there, or the external view lags behind ours.
            Some(_) => return Ok(Reconciled { order, steps: vec![] }),
            None if target.path_to(current).is_some() => {
                return Ok(Reconciled { order, steps: vec![] });
            }
            None => {
                return Err(FulfillmentError::InvalidTransition {
                    current,
                    requested: target,
                }
                .into());
            }
        };

        if let Some(reason) = order.hold_reason() {
            return Err(FulfillmentError::OrderOnHold {
                reason: reason.to_string(),
            }
            .into());
        }

        let mut tracking = tracking;
        let mut steps = Vec::with_capacity(path.len());
        for step in path {
            let step_tracking = if step.is_shipping_capable() {
                tracking.take()
            } else {
                None
            };
            let result = self
                .transition_locked(order_id, step, step_tracking, context)
                .await?;
            order = result.aggregate;
            steps.push(step);
        }

        Ok(Reconciled { order, steps })
    }

    /// Loads an order by ID, returning `None` if it doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: AggregateId,
    ) -> Result<Option<FulfillmentOrder>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Loads an order by ID, failing with `OrderNotFound`.
    pub async fn require_order(
        &self,
        order_id: AggregateId,
    ) -> Result<FulfillmentOrder, DomainError> {
        self.get_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Resolves a platform reference to the local order id.
    pub async fn find_by_external_ref(
        &self,
        external_ref: &ExternalOrderRef,
    ) -> Result<Option<AggregateId>, DomainError> {
        {
            let refs = self.refs.read().await;
            if refs.loaded {
                return Ok(refs.ids.get(external_ref).copied());
            }
        }

        let mut refs = self.refs.write().await;
        if !refs.loaded {
            for event_type in FulfillmentEvent::CREATION_TYPES {
                for envelope in self.handler.store().get_events_by_type(event_type).await? {
                    let event: FulfillmentEvent = serde_json::from_value(envelope.payload)?;
                    if let Some(known) = event.external_ref() {
                        refs.ids.insert(known.clone(), envelope.aggregate_id);
                    }
                }
            }
            refs.loaded = true;
            tracing::debug!(indexed = refs.ids.len(), "external reference index loaded");
        }
        Ok(refs.ids.get(external_ref).copied())
    }

    /// Returns the order's audit trail, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn audit_trail(&self, order_id: AggregateId) -> Result<Vec<AuditRecord>, DomainError> {
        let envelopes = self
            .handler
            .store()
            .get_events_for_aggregate(order_id)
            .await?;
        if envelopes.is_empty() {
            return Err(DomainError::OrderNotFound(order_id));
        }

        let mut replay = FulfillmentOrder::default();
        let mut records = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            let event: FulfillmentEvent = serde_json::from_value(envelope.payload.clone())?;
            replay.apply(event.clone());
            let hold_reason = replay.hold_reason().map(str::to_string);
            records.push(AuditRecord::new(envelope, event, hold_reason));
        }
        Ok(records)
    }

    async fn existing_by_ref(
        &self,
        external_ref: &ExternalOrderRef,
    ) -> Result<Option<Ingested>, DomainError> {
        let Some(order_id) = self.find_by_external_ref(external_ref).await? else {
            return Ok(None);
        };
        tracing::debug!(%order_id, "external reference already ingested");
        let order = self.require_order(order_id).await?;
        Ok(Some(Ingested {
            order,
            created: false,
        }))
    }

    /// Runs one transition. Caller must hold the order's lock.
    async fn transition_locked(
        &self,
        order_id: AggregateId,
        target: FulfillmentState,
        tracking: Option<TrackingInfo>,
        context: &CommandContext,
    ) -> Result<CommandResult<FulfillmentOrder>, DomainError> {
        let result = self
            .handler
            .execute(order_id, context, |order| {
                order.transition(target, tracking.clone())
            })
            .await
            .map_err(not_found(order_id))?;

        metrics::counter!("fulfillment_transitions_total", "to" => target.as_str()).increment(1);
        tracing::info!(%order_id, to = %target, job_id = ?context.job_id, "order transitioned");
        Ok(result)
    }
}

fn not_found(order_id: AggregateId) -> impl Fn(DomainError) -> DomainError {
    move |e| match e {
        DomainError::Fulfillment(FulfillmentError::NotIngested) => {
            DomainError::OrderNotFound(order_id)
        }
        other => other,
    }
}
