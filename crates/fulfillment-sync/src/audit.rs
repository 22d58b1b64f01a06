//! Human-readable audit lines for sync and bulk jobs.
//!
//! The store keeps the authoritative per-order trail. These lines exist for
//! operators following a running job, so they are throttled: quiet batches
//! stay silent unless the run was triggered by hand.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use common::{AggregateId, JobId};
use domain::FulfillmentState;

use crate::batch::BatchResult;

/// Tracing target of [`TracingAuditSink`] lines.
pub const AUDIT_TARGET: &str = "fulfillment_audit";

/// Destination for audit lines.
pub trait AuditSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes each line as an info event under [`AUDIT_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: AUDIT_TARGET, "{line}");
    }
}

/// Keeps lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// What changed on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Transition {
        from: FulfillmentState,
        to: FulfillmentState,
    },
    Held {
        state: FulfillmentState,
        reason: String,
    },
    Released {
        state: FulfillmentState,
    },
}

/// One order change made by a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub order_id: AggregateId,
    pub kind: ChangeKind,
}

impl StateChange {
    pub fn transition(order_id: AggregateId, from: FulfillmentState, to: FulfillmentState) -> Self {
        Self {
            order_id,
            kind: ChangeKind::Transition { from, to },
        }
    }

    pub fn held(order_id: AggregateId, state: FulfillmentState, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            kind: ChangeKind::Held {
                state,
                reason: reason.into(),
            },
        }
    }

    pub fn released(order_id: AggregateId, state: FulfillmentState) -> Self {
        Self {
            order_id,
            kind: ChangeKind::Released { state },
        }
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChangeKind::Transition { from, to } => {
                write!(f, "order {} {from} -> {to}", self.order_id)
            }
            ChangeKind::Held { state, reason } => {
                write!(f, "order {} held in {state}: {reason}", self.order_id)
            }
            ChangeKind::Released { state } => {
                write!(f, "order {} released in {state}", self.order_id)
            }
        }
    }
}

/// Per-batch audit logger.
///
/// Create one per batch and call [`start_batch`](Self::start_batch) before
/// work begins; change lines carry the time elapsed since then.
pub struct SyncAuditLogger {
    sink: Arc<dyn AuditSink>,
    job_id: Option<JobId>,
    started: Option<Instant>,
}

impl SyncAuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            job_id: None,
            started: None,
        }
    }

    /// Tags every line with a job id.
    pub fn for_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Marks the timing origin.
    pub fn start_batch(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Time since [`start_batch`](Self::start_batch), zero if never started.
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Writes one line for a change.
    pub fn log_state_change(&self, change: &StateChange) {
        let line = format!(
            "[+{}ms]{} {change}",
            self.elapsed().as_millis(),
            self.job_tag()
        );
        self.sink.write_line(&line);
    }

    /// Writes the batch summary line.
    ///
    /// A batch that updated nothing and failed nothing is not logged unless
    /// `force` is set. Returns whether a line was written.
    pub fn log_batch_summary(&self, service: &str, result: &BatchResult, force: bool) -> bool {
        if result.is_quiet() && !force {
            return false;
        }

        let line = format!(
            "[{service}]{} processed={} updated={} unchanged={} failed={} skipped={} elapsed={}ms",
            self.job_tag(),
            result.total_processed,
            result.updated,
            result.unchanged,
            result.failed,
            result.skipped,
            self.elapsed().as_millis()
        );
        self.sink.write_line(&line);
        true
    }

    fn job_tag(&self) -> String {
        self.job_id
            .as_ref()
            .map(|job| format!(" job={job}"))
            .unwrap_or_default()
    }
}
