use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal identifier of a fulfillment order.
///
/// Opaque and stable for the lifetime of the order. Wraps a UUID so it
/// cannot be confused with platform-assigned references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Order reference assigned by a sales channel or storefront platform.
///
/// The same reference can arrive more than once (webhook retries,
/// re-polls), so it is never used as the internal identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalOrderRef(String);

impl ExternalOrderRef {
    /// Creates a reference, trimming surrounding whitespace.
    pub fn new(reference: impl AsRef<str>) -> Self {
        Self(reference.as_ref().trim().to_string())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the reference is empty after trimming.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ExternalOrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalOrderRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExternalOrderRef {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Who caused a change to an order.
///
/// Recorded on every audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Actor {
    /// A warehouse operator acting through the admin surface.
    Operator(String),

    /// An automated component (webhook ingestion, scheduler).
    System(String),

    /// An external fulfillment provider whose acknowledgment was reconciled.
    Provider(String),
}

impl Actor {
    /// Shorthand for an operator actor.
    pub fn operator(name: impl Into<String>) -> Self {
        Actor::Operator(name.into())
    }

    /// Shorthand for a system actor.
    pub fn system(name: impl Into<String>) -> Self {
        Actor::System(name.into())
    }

    /// Shorthand for a provider actor.
    pub fn provider(name: impl Into<String>) -> Self {
        Actor::Provider(name.into())
    }

    /// Returns the actor's name without its kind.
    pub fn name(&self) -> &str {
        match self {
            Actor::Operator(name) | Actor::System(name) | Actor::Provider(name) => name,
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Operator(name) => write!(f, "operator:{name}"),
            Actor::System(name) => write!(f, "system:{name}"),
            Actor::Provider(name) => write!(f, "provider:{name}"),
        }
    }
}
