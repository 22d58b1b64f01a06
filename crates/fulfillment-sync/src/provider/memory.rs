//! Scriptable in-memory provider.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::ExternalOrderRef;

use super::{DesiredRemoteState, FulfillmentProvider, ProviderResponse, RemoteSnapshot};

#[derive(Debug, Default)]
struct ProviderState {
    remote: HashMap<ExternalOrderRef, RemoteSnapshot>,
    held: HashMap<ExternalOrderRef, String>,
    scripted: HashMap<ExternalOrderRef, VecDeque<ProviderResponse>>,
    delay: Option<Duration>,
    push_calls: usize,
    fetch_calls: usize,
}

/// Provider double that remembers what it was told.
///
/// Scripted responses for an order are returned first, in order, before
/// the provider falls back to its remembered state.
#[derive(Debug, Clone)]
pub struct InMemoryFulfillmentProvider {
    name: String,
    state: Arc<Mutex<ProviderState>>,
}

impl Default for InMemoryFulfillmentProvider {
    fn default() -> Self {
        Self::new("in-memory")
    }
}

impl InMemoryFulfillmentProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    /// Sets the provider's view of an order.
    pub fn set_remote_state(&self, external_ref: impl Into<ExternalOrderRef>, snapshot: RemoteSnapshot) {
        self.lock().remote.insert(external_ref.into(), snapshot);
    }

    /// Returns the provider's view of an order.
    pub fn remote_state(&self, external_ref: &ExternalOrderRef) -> Option<RemoteSnapshot> {
        self.lock().remote.get(external_ref).cloned()
    }

    /// Returns the hold reason the provider knows for an order.
    pub fn remote_hold(&self, external_ref: &ExternalOrderRef) -> Option<String> {
        self.lock().held.get(external_ref).cloned()
    }

    /// Queues a response for the next call about an order.
    pub fn script_response(&self, external_ref: impl Into<ExternalOrderRef>, response: ProviderResponse) {
        self.lock()
            .scripted
            .entry(external_ref.into())
            .or_default()
            .push_back(response);
    }

    /// Makes the next `times` calls about an order fail transiently.
    pub fn fail_transiently(&self, external_ref: impl Into<ExternalOrderRef>, times: usize) {
        let external_ref = external_ref.into();
        for _ in 0..times {
            self.script_response(
                external_ref.clone(),
                ProviderResponse::TransientFailure("upstream timeout".to_string()),
            );
        }
    }

    /// Makes the next call about an order fail permanently.
    pub fn reject(&self, external_ref: impl Into<ExternalOrderRef>, message: impl Into<String>) {
        self.script_response(external_ref, ProviderResponse::PermanentFailure(message.into()));
    }

    /// Delays every answer.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    pub fn push_calls(&self) -> usize {
        self.lock().push_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        let delay = self.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl FulfillmentProvider for InMemoryFulfillmentProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push_desired_state(
        &self,
        external_ref: &ExternalOrderRef,
        desired: DesiredRemoteState,
    ) -> ProviderResponse {
        let scripted = {
            let mut state = self.lock();
            state.push_calls += 1;
            state
                .scripted
                .get_mut(external_ref)
                .and_then(VecDeque::pop_front)
        };
        self.pause().await;
        if let Some(response) = scripted {
            return response;
        }

        let mut state = self.lock();
        let hold_changed = if desired.held {
            let reason = desired.hold_reason.clone().unwrap_or_default();
            state.held.insert(external_ref.clone(), reason.clone()) != Some(reason)
        } else {
            state.held.remove(external_ref).is_some()
        };

        match state.remote.get(external_ref).cloned() {
            Some(current) if current.state == desired.state => {
                if hold_changed {
                    ProviderResponse::Accepted(current)
                } else {
                    ProviderResponse::AlreadyInState(current)
                }
            }
            // The provider is further along than we are; report its view.
            Some(current) if desired.state.path_to(current.state).is_some() => {
                ProviderResponse::Accepted(current)
            }
            current => {
                let snapshot = RemoteSnapshot {
                    state: desired.state,
                    tracking: current.and_then(|c| c.tracking),
                };
                state.remote.insert(external_ref.clone(), snapshot.clone());
                ProviderResponse::Accepted(snapshot)
            }
        }
    }

    async fn fetch_remote_state(&self, external_ref: &ExternalOrderRef) -> ProviderResponse {
        let scripted = {
            let mut state = self.lock();
            state.fetch_calls += 1;
            state
                .scripted
                .get_mut(external_ref)
                .and_then(VecDeque::pop_front)
        };
        self.pause().await;
        if let Some(response) = scripted {
            return response;
        }

        match self.lock().remote.get(external_ref).cloned() {
            Some(snapshot) => ProviderResponse::Accepted(snapshot),
            None => ProviderResponse::PermanentFailure(format!(
                "order {external_ref} unknown to provider"
            )),
        }
    }
}
