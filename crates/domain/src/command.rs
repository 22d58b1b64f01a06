//! Command handling infrastructure.

use std::marker::PhantomData;

use common::{Actor, AggregateId, JobId};
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreError, Version};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Attempts made when an append loses an optimistic-concurrency race.
pub const MAX_CONFLICT_ATTEMPTS: usize = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted. Empty when the command
    /// found the aggregate already in the requested condition.
    pub events: Vec<A::Event>,

    /// The version of the aggregate after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command recorded at least one event.
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Who is issuing a command and, optionally, the job it runs under.
///
/// Both are written to the metadata of every event the command records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub actor: Actor,
    pub job_id: Option<JobId>,
}

impl CommandContext {
    /// A context with no job.
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            job_id: None,
        }
    }

    /// Tags the context with a job id.
    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}

/// A request to act on one aggregate.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Loads aggregates, runs command decisions, and persists the results.
///
/// A decision that produces no events is reported back without touching
/// the store. Appends use the loaded version as the expected version, so a
/// concurrent writer causes a reload and a fresh decision instead of a
/// lost update.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    A::Event: DeserializeOwned + Serialize,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate from its events.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning `None` if it has no events.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command decision and persists the resulting events.
    ///
    /// `command_fn` may run more than once if another writer gets in first.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        context: &CommandContext,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut aggregate = self.load(aggregate_id).await?;
            let current_version = aggregate.version();

            let events = command_fn(&aggregate)?;
            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    new_version: current_version,
                });
            }

            let envelopes = self.build_envelopes(aggregate_id, current_version, context, &events)?;

            match self
                .store
                .append(envelopes, AppendOptions::expect_version(current_version))
                .await
            {
                Ok(new_version) => {
                    for event in &events {
                        aggregate.apply(event.clone());
                    }
                    aggregate.set_version(new_version);
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version,
                    });
                }
                Err(EventStoreError::ConcurrencyConflict { .. })
                    if attempt < MAX_CONFLICT_ATTEMPTS =>
                {
                    tracing::debug!(%aggregate_id, attempt, "append conflict, reloading");
                }
                Err(EventStoreError::ConcurrencyConflict { .. }) => {
                    return Err(DomainError::ConflictRetriesExhausted {
                        aggregate_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        context: &CommandContext,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .actor(&context.actor)?
                .job_id(context.job_id.as_ref())
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
