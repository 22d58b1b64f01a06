//! Batch results and the bounded fan-out shared by every executor.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use common::AggregateId;
use domain::{DomainError, FulfillmentError, FulfillmentState};
use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::error::{Result, SyncError};

/// Why one order in a batch was not brought to the requested condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFailure {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Invalid transition: cannot move from {current} to {requested}")]
    InvalidTransition {
        current: FulfillmentState,
        requested: FulfillmentState,
    },

    #[error("Order is on hold: {reason}")]
    OrderOnHold { reason: String },

    /// Any other rule the order's state machine refused.
    #[error("{message}")]
    Rejected { message: String },

    /// Other writers kept changing the order.
    #[error("Order kept changing concurrently ({attempts} attempts)")]
    ConcurrentModification { attempts: usize },

    /// The provider kept failing transiently until attempts ran out.
    #[error("Provider failed transiently after {attempts} attempts: {message}")]
    TransientProvider { attempts: u32, message: String },

    /// The provider refused the request outright.
    #[error("Provider rejected the request: {message}")]
    PermanentProvider { message: String },
}

impl ItemFailure {
    /// Translates a non-fatal domain error into a per-item failure.
    pub fn from_domain(error: &DomainError) -> Self {
        match error {
            DomainError::OrderNotFound(_) => ItemFailure::OrderNotFound,
            DomainError::Fulfillment(FulfillmentError::InvalidTransition { current, requested }) => {
                ItemFailure::InvalidTransition {
                    current: *current,
                    requested: *requested,
                }
            }
            DomainError::Fulfillment(FulfillmentError::OrderOnHold { reason }) => {
                ItemFailure::OrderOnHold {
                    reason: reason.clone(),
                }
            }
            DomainError::ConflictRetriesExhausted { attempts, .. } => {
                ItemFailure::ConcurrentModification {
                    attempts: *attempts,
                }
            }
            other => ItemFailure::Rejected {
                message: other.to_string(),
            },
        }
    }
}

/// What happened to one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Updated,
    /// Already in the requested condition.
    Unchanged,
    Failed(ItemFailure),
    /// Not started because the batch was cancelled.
    Skipped,
}

/// A failed order and its cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub order_id: AggregateId,
    pub failure: ItemFailure,
    /// Human-readable form of `failure`.
    pub message: String,
}

/// Tally of a batch.
///
/// `total_processed` always equals `updated + unchanged + failed`.
/// Skipped orders were never started and are counted separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_processed: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Failures in the order the orders were supplied.
    pub failures: Vec<FailedItem>,
}

impl BatchResult {
    /// Adds one order's outcome.
    pub fn record(&mut self, order_id: AggregateId, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Unchanged => self.unchanged += 1,
            ItemOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(FailedItem {
                    order_id,
                    message: failure.to_string(),
                    failure,
                });
            }
            ItemOutcome::Skipped => {
                self.skipped += 1;
                return;
            }
        }
        self.total_processed += 1;
    }

    /// Returns true if nothing was updated and nothing failed.
    pub fn is_quiet(&self) -> bool {
        self.updated == 0 && self.failed == 0
    }
}

/// Turns a domain error into a per-item outcome, or a batch abort when the
/// error is an infrastructure outage.
pub(crate) fn classify(error: DomainError) -> Result<ItemOutcome> {
    if error.is_fatal() {
        return Err(SyncError::Fatal(error));
    }
    Ok(ItemOutcome::Failed(ItemFailure::from_domain(&error)))
}

/// Runs `work` for each order with at most `concurrency` in flight.
///
/// Outcomes are tallied in the order the ids were supplied. Cancellation
/// and fatal errors are checked before each order starts; orders already
/// running are left to finish. The first fatal error is returned after
/// every in-flight order has completed.
pub(crate) async fn fan_out<F, Fut>(
    order_ids: Vec<AggregateId>,
    concurrency: usize,
    cancel: &CancelSignal,
    work: F,
) -> Result<BatchResult>
where
    F: Fn(AggregateId) -> Fut,
    Fut: Future<Output = Result<ItemOutcome>>,
{
    let aborted = AtomicBool::new(false);
    let work = &work;
    let aborted_ref = &aborted;

    let outcomes: Vec<(AggregateId, Result<ItemOutcome>)> = stream::iter(order_ids)
        .map(move |order_id| async move {
            if cancel.is_cancelled() || aborted_ref.load(Ordering::SeqCst) {
                return (order_id, Ok(ItemOutcome::Skipped));
            }
            let outcome = work(order_id).await;
            if outcome.is_err() {
                aborted_ref.store(true, Ordering::SeqCst);
            }
            (order_id, outcome)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut result = BatchResult::default();
    for (order_id, outcome) in outcomes {
        result.record(order_id, outcome?);
    }
    Ok(result)
}
