//! Shared identifiers for the fulfillment engine.
//!
//! Everything here is a leaf: no I/O, no async, no dependency on the
//! other workspace crates.

pub mod job_id;
pub mod types;

pub use job_id::{JobId, generate_job_id};
pub use types::{Actor, AggregateId, ExternalOrderRef};
