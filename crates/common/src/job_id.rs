//! Identifiers for asynchronous sync jobs.
//!
//! A job id reads as `<prefix>-<YYYYMMDD>-<8 hex chars>`, e.g.
//! `sync-20261019-3f9a0c12`. The random suffix makes collisions unlikely
//! enough for log correlation, but nothing relies on uniqueness: job ids
//! are never primary keys and never used for exactly-once semantics.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the random suffix.
const SUFFIX_LEN: usize = 8;

/// Prefix used when the caller passes an empty one.
const DEFAULT_PREFIX: &str = "job";

/// Traceable identifier of one sync or bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps an existing identifier, e.g. one read back from an audit record.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the prefix portion (everything before the date bucket).
    pub fn prefix(&self) -> &str {
        // The last two dash-separated segments are the date and suffix.
        let mut parts = self.0.rsplitn(3, '-');
        let _suffix = parts.next();
        let _date = parts.next();
        parts.next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a job id for today's date (UTC).
pub fn generate_job_id(prefix: &str) -> JobId {
    generate_job_id_on(prefix, Utc::now().date_naive())
}

/// Generates a job id bucketed on the given date.
pub fn generate_job_id_on(prefix: &str, date: NaiveDate) -> JobId {
    let prefix = prefix.trim();
    let prefix = if prefix.is_empty() {
        DEFAULT_PREFIX
    } else {
        prefix
    };
    let random = Uuid::new_v4().simple().to_string();
    JobId(format!(
        "{prefix}-{}-{}",
        date.format("%Y%m%d"),
        &random[..SUFFIX_LEN]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_has_prefix_date_and_suffix() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let id = generate_job_id_on("sync", date);
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "sync");
        assert_eq!(parts[1], "20261019");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn consecutive_ids_differ() {
        let a = generate_job_id("poll");
        let b = generate_job_id("poll");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_prefix_falls_back() {
        let id = generate_job_id("  ");
        assert!(id.as_str().starts_with("job-"));
    }

    #[test]
    fn prefix_survives_dashes() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let id = generate_job_id_on("bulk-hold", date);
        assert_eq!(id.prefix(), "bulk-hold");
        assert!(id.as_str().starts_with("bulk-hold-20260102-"));
    }
}
