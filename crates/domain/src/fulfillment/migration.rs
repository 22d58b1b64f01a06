//! Mapping of deprecated state labels onto the canonical states.
//!
//! Older records carry free-form labels from before the state machine was
//! closed. The table below is the complete, fixed mapping. A label that is
//! neither canonical nor in the table is an anomaly: it is reported and
//! left alone, never mapped to a default.

use serde::Serialize;

use super::{FulfillmentError, FulfillmentState};

/// Fixed legacy-label table. Keys are lowercase.
const LEGACY_LABELS: &[(&str, FulfillmentState)] = &[
    ("new", FulfillmentState::Pending),
    ("open", FulfillmentState::Pending),
    ("in_preparation", FulfillmentState::Preparation),
    ("preparing", FulfillmentState::Preparation),
    ("confirmed", FulfillmentState::Acknowledged),
    ("accepted", FulfillmentState::Acknowledged),
    // "in-progress" family
    ("in_progress", FulfillmentState::PickProcess),
    ("processing", FulfillmentState::PickProcess),
    ("picking", FulfillmentState::PickProcess),
    ("pick_process", FulfillmentState::PickProcess),
    // "ready-to-ship" family
    ("ready_to_ship", FulfillmentState::Locked),
    ("packed", FulfillmentState::Locked),
    ("awaiting_pickup", FulfillmentState::Locked),
    ("dispatched", FulfillmentState::Shipped),
    ("out_for_delivery", FulfillmentState::InTransit),
    ("completed", FulfillmentState::Delivered),
    ("fulfilled", FulfillmentState::Delivered),
    ("delivery_failed", FulfillmentState::FailedDelivery),
    ("undeliverable", FulfillmentState::FailedDelivery),
    ("returned", FulfillmentState::ReturnedToSender),
];

/// What happened to one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "state", rename_all = "snake_case")]
pub enum LabelMigration {
    /// The label already names a canonical state.
    AlreadyCanonical(FulfillmentState),

    /// The label is a legacy alias of this canonical state.
    Migrated(FulfillmentState),
}

impl LabelMigration {
    /// The canonical state, however it was reached.
    pub fn state(&self) -> FulfillmentState {
        match self {
            LabelMigration::AlreadyCanonical(state) | LabelMigration::Migrated(state) => *state,
        }
    }
}

/// One migrated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedRecord<K> {
    pub key: K,
    pub legacy_label: String,
    pub state: FulfillmentState,
}

/// One record whose label could not be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationAnomaly<K> {
    pub key: K,
    pub label: String,
}

/// Outcome of migrating a set of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport<K> {
    pub migrated: Vec<MigratedRecord<K>>,
    pub already_canonical: Vec<(K, FulfillmentState)>,
    pub anomalies: Vec<MigrationAnomaly<K>>,
}

impl<K> Default for MigrationReport<K> {
    fn default() -> Self {
        Self {
            migrated: Vec::new(),
            already_canonical: Vec::new(),
            anomalies: Vec::new(),
        }
    }
}

impl<K> MigrationReport<K> {
    /// Returns true if every record mapped cleanly.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Pure legacy-label policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMigrationPolicy;

impl StateMigrationPolicy {
    /// Maps one label.
    ///
    /// Matching ignores surrounding whitespace and ASCII case only.
    pub fn migrate_label(label: &str) -> Result<LabelMigration, FulfillmentError> {
        if let Ok(state) = label.parse::<FulfillmentState>() {
            return Ok(LabelMigration::AlreadyCanonical(state));
        }

        let normalized = label.trim().to_ascii_lowercase();
        LEGACY_LABELS
            .iter()
            .find(|(legacy, _)| *legacy == normalized)
            .map(|(_, state)| LabelMigration::Migrated(*state))
            .ok_or_else(|| FulfillmentError::UnmigratableState {
                label: label.to_string(),
            })
    }

    /// Returns the legacy labels that map onto `state`.
    pub fn legacy_labels_for(state: FulfillmentState) -> impl Iterator<Item = &'static str> {
        LEGACY_LABELS
            .iter()
            .filter(move |(_, target)| *target == state)
            .map(|(label, _)| *label)
    }

    /// Maps a batch of `(key, label)` records.
    ///
    /// Unknown labels end up in `anomalies` with their original spelling.
    pub fn migrate_all<K, L, I>(records: I) -> MigrationReport<K>
    where
        I: IntoIterator<Item = (K, L)>,
        L: AsRef<str>,
        K: std::fmt::Debug,
    {
        let mut report = MigrationReport::default();
        for (key, label) in records {
            let label = label.as_ref();
            match Self::migrate_label(label) {
                Ok(LabelMigration::AlreadyCanonical(state)) => {
                    report.already_canonical.push((key, state));
                }
                Ok(LabelMigration::Migrated(state)) => report.migrated.push(MigratedRecord {
                    key,
                    legacy_label: label.to_string(),
                    state,
                }),
                Err(_) => {
                    tracing::warn!(?key, label, "unmigratable legacy state label");
                    report.anomalies.push(MigrationAnomaly {
                        key,
                        label: label.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_maps_to_its_target() {
        for (label, state) in LEGACY_LABELS {
            assert_eq!(
                StateMigrationPolicy::migrate_label(label).unwrap(),
                LabelMigration::Migrated(*state),
                "{label}"
            );
        }
    }

    #[test]
    fn in_progress_family_collapses_onto_pickprocess() {
        let labels: Vec<_> =
            StateMigrationPolicy::legacy_labels_for(FulfillmentState::PickProcess).collect();
        assert!(labels.len() > 1);
        assert!(labels.contains(&"in_progress"));
    }

    #[test]
    fn ready_to_ship_family_collapses_onto_locked() {
        for label in ["ready_to_ship", "packed", "awaiting_pickup"] {
            assert_eq!(
                StateMigrationPolicy::migrate_label(label).unwrap().state(),
                FulfillmentState::Locked
            );
        }
    }

    #[test]
    fn canonical_labels_pass_through() {
        assert_eq!(
            StateMigrationPolicy::migrate_label("SHIPPED").unwrap(),
            LabelMigration::AlreadyCanonical(FulfillmentState::Shipped)
        );
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        assert_eq!(
            StateMigrationPolicy::migrate_label("  Ready_To_Ship ").unwrap(),
            LabelMigration::Migrated(FulfillmentState::Locked)
        );
    }

    #[test]
    fn unknown_label_is_not_guessed() {
        let err = StateMigrationPolicy::migrate_label("ready to ship soon").unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::UnmigratableState { ref label } if label == "ready to ship soon"
        ));
        assert!(StateMigrationPolicy::migrate_label("").is_err());
    }

    #[test]
    fn migrate_all_splits_records() {
        let report = StateMigrationPolicy::migrate_all(vec![
            (1, "picking"),
            (2, "LOCKED"),
            (3, "lost_in_warehouse"),
            (4, "returned"),
        ]);

        assert_eq!(report.migrated.len(), 2);
        assert_eq!(report.migrated[0].key, 1);
        assert_eq!(report.migrated[0].state, FulfillmentState::PickProcess);
        assert_eq!(report.migrated[1].state, FulfillmentState::ReturnedToSender);
        assert_eq!(report.already_canonical, vec![(2, FulfillmentState::Locked)]);
        assert_eq!(
            report.anomalies,
            vec![MigrationAnomaly {
                key: 3,
                label: "lost_in_warehouse".to_string()
            }]
        );
        assert!(!report.is_clean());
    }
}
