//! External fulfillment provider boundary.
//!
//! Provider payloads are decoded into [`ProviderResponse`] here, before
//! anything else looks at them. Core logic only ever sees a normalized
//! state, a transient failure, or a permanent failure.

pub mod memory;

use async_trait::async_trait;
use common::ExternalOrderRef;
use domain::{FulfillmentOrder, FulfillmentState, StateMigrationPolicy, TrackingInfo};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryFulfillmentProvider;

/// The state we want the provider to hold for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRemoteState {
    pub state: FulfillmentState,
    pub held: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_reason: Option<String>,
}

impl DesiredRemoteState {
    /// Derives the desired remote state from the local order.
    pub fn for_order(order: &FulfillmentOrder) -> Self {
        Self {
            state: order.state(),
            held: order.is_held(),
            hold_reason: order.hold_reason().map(str::to_string),
        }
    }
}

/// The provider's view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub state: FulfillmentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<TrackingInfo>,
}

impl RemoteSnapshot {
    pub fn new(state: FulfillmentState) -> Self {
        Self {
            state,
            tracking: None,
        }
    }

    pub fn with_tracking(mut self, tracking: TrackingInfo) -> Self {
        self.tracking = Some(tracking);
        self
    }
}

/// Normalized provider answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    /// The provider applied the request; this is its resulting view.
    Accepted(RemoteSnapshot),
    /// The provider was already there.
    AlreadyInState(RemoteSnapshot),
    /// Worth retrying: timeouts, throttling, upstream hiccups.
    TransientFailure(String),
    /// Retrying will not help.
    PermanentFailure(String),
}

impl ProviderResponse {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderResponse::TransientFailure(_))
    }
}

/// Adapter for one external fulfillment network.
#[async_trait]
pub trait FulfillmentProvider: Send + Sync {
    /// Name used in audit summaries.
    fn name(&self) -> &str;

    /// Asks the provider to hold `desired` for the order.
    async fn push_desired_state(
        &self,
        external_ref: &ExternalOrderRef,
        desired: DesiredRemoteState,
    ) -> ProviderResponse;

    /// Reads the provider's current view of the order.
    async fn fetch_remote_state(&self, external_ref: &ExternalOrderRef) -> ProviderResponse;
}

/// Wire shape of a provider answer.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ProviderPayload {
    Accepted {
        state: String,
        #[serde(default)]
        tracking: Option<TrackingInfo>,
    },
    AlreadyInState {
        state: String,
        #[serde(default)]
        tracking: Option<TrackingInfo>,
    },
    #[serde(alias = "timeout", alias = "throttled")]
    TransientError {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(alias = "error")]
    Rejected {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Decodes a raw provider answer.
///
/// Remote state labels go through the legacy-label policy, so providers
/// still reporting deprecated labels are understood. A label the policy
/// cannot map, an unknown status, or a malformed body is a permanent
/// failure: nothing is guessed.
pub fn decode_provider_payload(payload: serde_json::Value) -> ProviderResponse {
    let payload: ProviderPayload = match serde_json::from_value(payload) {
        Ok(payload) => payload,
        Err(e) => return ProviderResponse::PermanentFailure(format!("undecodable payload: {e}")),
    };

    let snapshot = |state: &str, tracking: Option<TrackingInfo>| {
        StateMigrationPolicy::migrate_label(state)
            .map(|migration| RemoteSnapshot {
                state: migration.state(),
                tracking,
            })
            .map_err(|e| ProviderResponse::PermanentFailure(e.to_string()))
    };

    match payload {
        ProviderPayload::Accepted { state, tracking } => match snapshot(&state, tracking) {
            Ok(snapshot) => ProviderResponse::Accepted(snapshot),
            Err(failure) => failure,
        },
        ProviderPayload::AlreadyInState { state, tracking } => match snapshot(&state, tracking) {
            Ok(snapshot) => ProviderResponse::AlreadyInState(snapshot),
            Err(failure) => failure,
        },
        ProviderPayload::TransientError { message } => ProviderResponse::TransientFailure(
            message.unwrap_or_else(|| "transient provider error".to_string()),
        ),
        ProviderPayload::Rejected { message } => ProviderResponse::PermanentFailure(
            message.unwrap_or_else(|| "rejected by provider".to_string()),
        ),
    }
}
