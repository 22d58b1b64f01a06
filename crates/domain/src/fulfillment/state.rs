//! Fulfillment state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where an order is in its physical fulfillment.
///
/// Legal transitions, one step at a time:
/// ```text
/// Pending ──► Preparation ──► Acknowledged ──► PickProcess ──► Locked
///                                                                 │
///        ┌────────────────────────────────────────────────────────┘
///        ▼
///     Shipped ──► InTransit ──┬──► Delivered          (terminal, success)
///                             ├──► FailedDelivery     (terminal, failure)
///                             └──► ReturnedToSender   (terminal, failure)
/// ```
/// There are no backward moves and no skips. Holds are tracked separately
/// and never change the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentState {
    /// Ingested from a channel, nothing done yet.
    #[default]
    Pending,

    /// Warehouse is preparing to accept the order.
    Preparation,

    /// Fulfillment network acknowledged the order.
    Acknowledged,

    /// Items are being picked.
    #[serde(rename = "PICKPROCESS")]
    PickProcess,

    /// Packed and locked for shipping; contents can no longer change.
    Locked,

    /// Handed to the carrier.
    Shipped,

    /// Carrier reports the parcel moving.
    InTransit,

    /// Delivered to the customer (terminal).
    Delivered,

    /// Carrier gave up delivering (terminal).
    FailedDelivery,

    /// Parcel went back to the warehouse (terminal).
    ReturnedToSender,
}

/// Error returned when parsing a label that is not a canonical state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fulfillment state: {0}")]
pub struct ParseStateError(pub String);

impl FulfillmentState {
    /// Every state, in path order.
    pub const ALL: [FulfillmentState; 10] = [
        FulfillmentState::Pending,
        FulfillmentState::Preparation,
        FulfillmentState::Acknowledged,
        FulfillmentState::PickProcess,
        FulfillmentState::Locked,
        FulfillmentState::Shipped,
        FulfillmentState::InTransit,
        FulfillmentState::Delivered,
        FulfillmentState::FailedDelivery,
        FulfillmentState::ReturnedToSender,
    ];

    /// States reachable in exactly one step.
    pub fn successors(&self) -> &'static [FulfillmentState] {
        use FulfillmentState::*;
        match self {
            Pending => &[Preparation],
            Preparation => &[Acknowledged],
            Acknowledged => &[PickProcess],
            PickProcess => &[Locked],
            Locked => &[Shipped],
            Shipped => &[InTransit],
            InTransit => &[Delivered, FailedDelivery, ReturnedToSender],
            Delivered | FailedDelivery | ReturnedToSender => &[],
        }
    }

    /// Returns true if `target` is a legal next state.
    pub fn can_transition_to(&self, target: FulfillmentState) -> bool {
        self.successors().contains(&target)
    }

    /// Returns the chain of single-step transitions leading to `target`,
    /// excluding `self`.
    ///
    /// `Some(vec![])` when already there, `None` when `target` is behind
    /// or on a different terminal branch.
    pub fn path_to(&self, target: FulfillmentState) -> Option<Vec<FulfillmentState>> {
        let mut path = Vec::new();
        let mut current = *self;
        while current != target {
            let next = if current.can_transition_to(target) {
                target
            } else {
                // Off the fork, every state has exactly one successor.
                match current.successors() {
                    [only] => *only,
                    _ => return None,
                }
            };
            path.push(next);
            current = next;
        }
        Some(path)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Returns true for the terminal states that did not end in delivery.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FulfillmentState::FailedDelivery | FulfillmentState::ReturnedToSender
        )
    }

    /// Returns true once the parcel is with a carrier, i.e. tracking
    /// information may exist.
    pub fn is_shipping_capable(&self) -> bool {
        matches!(
            self,
            FulfillmentState::Shipped
                | FulfillmentState::InTransit
                | FulfillmentState::Delivered
                | FulfillmentState::FailedDelivery
                | FulfillmentState::ReturnedToSender
        )
    }

    /// Returns the canonical label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentState::Pending => "PENDING",
            FulfillmentState::Preparation => "PREPARATION",
            FulfillmentState::Acknowledged => "ACKNOWLEDGED",
            FulfillmentState::PickProcess => "PICKPROCESS",
            FulfillmentState::Locked => "LOCKED",
            FulfillmentState::Shipped => "SHIPPED",
            FulfillmentState::InTransit => "IN_TRANSIT",
            FulfillmentState::Delivered => "DELIVERED",
            FulfillmentState::FailedDelivery => "FAILED_DELIVERY",
            FulfillmentState::ReturnedToSender => "RETURNED_TO_SENDER",
        }
    }
}

impl std::fmt::Display for FulfillmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentState {
    type Err = ParseStateError;

    /// Parses a canonical label, ignoring ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        FulfillmentState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| ParseStateError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FulfillmentState::*;

    #[test]
    fn default_state_is_pending() {
        assert_eq!(FulfillmentState::default(), Pending);
    }

    #[test]
    fn main_path_moves_one_step_at_a_time() {
        let path = [
            Pending,
            Preparation,
            Acknowledged,
            PickProcess,
            Locked,
            Shipped,
            InTransit,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!Pending.can_transition_to(Acknowledged));
        assert!(!Locked.can_transition_to(InTransit));
    }

    #[test]
    fn no_backward_or_self_transitions() {
        for state in FulfillmentState::ALL {
            assert!(!state.can_transition_to(state));
            for earlier in FulfillmentState::ALL
                .into_iter()
                .take_while(|s| *s != state)
            {
                assert!(!state.can_transition_to(earlier), "{state} -> {earlier}");
            }
        }
    }

    #[test]
    fn in_transit_forks_into_three_terminals() {
        assert_eq!(
            InTransit.successors(),
            &[Delivered, FailedDelivery, ReturnedToSender]
        );
        for terminal in [Delivered, FailedDelivery, ReturnedToSender] {
            assert!(terminal.is_terminal());
            assert!(terminal.successors().is_empty());
        }
        assert!(!Delivered.is_failure());
        assert!(FailedDelivery.is_failure());
        assert!(ReturnedToSender.is_failure());
    }

    #[test]
    fn path_to_walks_forward() {
        assert_eq!(
            Acknowledged.path_to(Shipped),
            Some(vec![PickProcess, Locked, Shipped])
        );
        assert_eq!(Locked.path_to(Locked), Some(vec![]));
        assert_eq!(
            Shipped.path_to(ReturnedToSender),
            Some(vec![InTransit, ReturnedToSender])
        );
    }

    #[test]
    fn path_to_rejects_backward_and_cross_branch() {
        assert_eq!(Shipped.path_to(Pending), None);
        assert_eq!(Delivered.path_to(FailedDelivery), None);
        assert_eq!(FailedDelivery.path_to(InTransit), None);
    }

    #[test]
    fn shipping_capable_starts_at_shipped() {
        assert!(!Locked.is_shipping_capable());
        assert!(Shipped.is_shipping_capable());
        assert!(ReturnedToSender.is_shipping_capable());
    }

    #[test]
    fn labels_parse_back() {
        for state in FulfillmentState::ALL {
            assert_eq!(state.as_str().parse::<FulfillmentState>().unwrap(), state);
        }
        assert_eq!(" in_transit ".parse::<FulfillmentState>().unwrap(), InTransit);
        assert!("ready_to_ship".parse::<FulfillmentState>().is_err());
    }

    #[test]
    fn serde_uses_canonical_labels() {
        for state in FulfillmentState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
            let back: FulfillmentState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
    }
}
