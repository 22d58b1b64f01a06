//! HTTP route handlers.

pub mod bulk;
pub mod bundles;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod sync;
