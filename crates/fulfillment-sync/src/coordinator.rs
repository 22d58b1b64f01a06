//! Reconciliation with an external fulfillment provider.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use common::{Actor, AggregateId, JobId, generate_job_id};
use domain::{CommandContext, DomainError, FulfillmentService};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditSink, StateChange, SyncAuditLogger, TracingAuditSink};
use crate::batch::{BatchResult, ItemFailure, ItemOutcome, classify, fan_out};
use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::provider::{DesiredRemoteState, FulfillmentProvider, ProviderResponse};
use crate::settings::SyncSettings;

/// Why a sync runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Scheduled push of local changes.
    Incremental,
    /// Operator-triggered read of provider state.
    ManualPoll,
    /// Operator-triggered push.
    ManualPush,
}

impl SyncScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncScope::Incremental => "incremental",
            SyncScope::ManualPoll => "manual_poll",
            SyncScope::ManualPush => "manual_push",
        }
    }

    /// Job id prefix for runs in this scope.
    pub fn job_prefix(&self) -> &'static str {
        match self {
            SyncScope::Incremental => "sync",
            SyncScope::ManualPoll => "poll",
            SyncScope::ManualPush => "push",
        }
    }

    /// Hand-triggered runs always report their summary.
    pub fn forces_summary(&self) -> bool {
        !matches!(self, SyncScope::Incremental)
    }

    /// Whether runs push local state before reconciling.
    pub fn pushes(&self) -> bool {
        !matches!(self, SyncScope::ManualPoll)
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sync run. Kept for logs and callers only, never replayed.
#[derive(Debug, Clone, Serialize)]
pub struct SyncJob {
    pub job_id: JobId,
    pub scope: SyncScope,
    pub result: BatchResult,
}

/// Pushes local order state to a provider and folds its answer back in.
///
/// Each order is handled independently with bounded concurrency. Provider
/// calls get a timeout per attempt and a bounded number of attempts with
/// linear backoff. "Already in that state" from the provider is unchanged,
/// not an error.
pub struct ExternalSyncCoordinator<S: EventStore, P: FulfillmentProvider> {
    service: Arc<FulfillmentService<S>>,
    provider: Arc<P>,
    settings: SyncSettings,
    sink: Arc<dyn AuditSink>,
}

impl<S, P> ExternalSyncCoordinator<S, P>
where
    S: EventStore,
    P: FulfillmentProvider,
{
    pub fn new(service: Arc<FulfillmentService<S>>, provider: Arc<P>, settings: SyncSettings) -> Self {
        Self {
            service,
            provider,
            settings,
            sink: Arc::new(TracingAuditSink),
        }
    }

    /// Sends audit lines to `sink` instead of tracing.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Syncs `order_ids` in the order supplied.
    #[tracing::instrument(skip(self, order_ids, cancel), fields(provider = self.provider.name(), orders = order_ids.len()))]
    pub async fn run(
        &self,
        scope: SyncScope,
        order_ids: Vec<AggregateId>,
        cancel: &CancelSignal,
    ) -> Result<SyncJob> {
        let started = Instant::now();
        let job_id = generate_job_id(scope.job_prefix());
        let mut audit = SyncAuditLogger::new(self.sink.clone()).for_job(job_id.clone());
        audit.start_batch();
        metrics::counter!("sync_jobs_total", "scope" => scope.as_str()).increment(1);
        tracing::info!(%job_id, "sync started");

        let context = CommandContext::new(Actor::provider(self.provider.name())).with_job(job_id.clone());
        let audit = &audit;
        let context = &context;
        let result = fan_out(order_ids, self.settings.concurrency, cancel, |order_id| async move {
            match self.sync_order(scope, order_id, context, audit).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => classify(e),
            }
        })
        .await;

        metrics::histogram!("sync_job_duration_seconds").record(started.elapsed().as_secs_f64());
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%job_id, error = %e, "sync aborted");
                return Err(e);
            }
        };

        audit.log_batch_summary(self.provider.name(), &result, scope.forces_summary());

        Ok(SyncJob {
            job_id,
            scope,
            result,
        })
    }

    async fn sync_order(
        &self,
        scope: SyncScope,
        order_id: AggregateId,
        context: &CommandContext,
        audit: &SyncAuditLogger,
    ) -> std::result::Result<ItemOutcome, DomainError> {
        let order = self.service.require_order(order_id).await?;
        let Some(external_ref) = order.external_ref().cloned() else {
            return Ok(ItemOutcome::Failed(ItemFailure::Rejected {
                message: "order has no external reference".to_string(),
            }));
        };

        let (response, attempts) = if scope.pushes() {
            let desired = DesiredRemoteState::for_order(&order);
            self.call_with_retry(|| self.provider.push_desired_state(&external_ref, desired.clone()))
                .await
        } else {
            self.call_with_retry(|| self.provider.fetch_remote_state(&external_ref))
                .await
        };

        let (snapshot, remote_changed) = match response {
            ProviderResponse::Accepted(snapshot) => (snapshot, scope.pushes()),
            ProviderResponse::AlreadyInState(snapshot) => (snapshot, false),
            ProviderResponse::TransientFailure(message) => {
                tracing::warn!(%order_id, attempts, %message, "provider kept failing");
                return Ok(ItemOutcome::Failed(ItemFailure::TransientProvider {
                    attempts,
                    message,
                }));
            }
            ProviderResponse::PermanentFailure(message) => {
                tracing::warn!(%order_id, %message, "provider rejected order");
                return Ok(ItemOutcome::Failed(ItemFailure::PermanentProvider { message }));
            }
        };

        let reconciled = self
            .service
            .reconcile_to(order_id, snapshot.state, snapshot.tracking, context)
            .await?;

        let mut from = order.state();
        for step in &reconciled.steps {
            audit.log_state_change(&StateChange::transition(order_id, from, *step));
            from = *step;
        }

        if reconciled.changed() || remote_changed {
            Ok(ItemOutcome::Updated)
        } else {
            Ok(ItemOutcome::Unchanged)
        }
    }

    /// Calls the provider until it answers with something other than a
    /// transient failure, or attempts run out. Timeouts count as transient.
    async fn call_with_retry<F, Fut>(&self, call: F) -> (ProviderResponse, u32)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProviderResponse>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = match tokio::time::timeout(self.settings.attempt_timeout, call()).await {
                Ok(response) => response,
                Err(_) => ProviderResponse::TransientFailure(format!(
                    "provider call timed out after {}ms",
                    self.settings.attempt_timeout.as_millis()
                )),
            };

            let outcome = match &response {
                ProviderResponse::Accepted(_) | ProviderResponse::AlreadyInState(_) => "ok",
                ProviderResponse::TransientFailure(_) => "transient",
                ProviderResponse::PermanentFailure(_) => "permanent",
            };
            metrics::counter!("sync_provider_attempts_total", "outcome" => outcome).increment(1);

            if !response.is_transient() || attempt >= self.settings.max_attempts {
                return (response, attempt);
            }

            tracing::debug!(attempt, "transient provider failure, retrying");
            tokio::time::sleep(self.settings.backoff_after(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_prefixes_and_forcing() {
        assert_eq!(SyncScope::Incremental.job_prefix(), "sync");
        assert_eq!(SyncScope::ManualPoll.job_prefix(), "poll");
        assert_eq!(SyncScope::ManualPush.job_prefix(), "push");

        assert!(!SyncScope::Incremental.forces_summary());
        assert!(SyncScope::ManualPoll.forces_summary());
        assert!(SyncScope::ManualPush.forces_summary());

        assert!(!SyncScope::ManualPoll.pushes());
    }

    #[test]
    fn scope_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncScope::ManualPoll).unwrap(),
            "\"manual_poll\""
        );
    }
}
