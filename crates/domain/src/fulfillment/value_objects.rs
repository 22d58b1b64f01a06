//! Value objects carried by fulfillment orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Carrier tracking for a shipped order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    /// Carrier name, e.g. "DHL".
    pub carrier: String,

    /// Carrier-assigned tracking number.
    pub tracking_number: String,

    /// Public tracking page, when the carrier provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
}

impl TrackingInfo {
    /// Creates tracking info without a URL.
    pub fn new(carrier: impl Into<String>, tracking_number: impl Into<String>) -> Self {
        Self {
            carrier: carrier.into(),
            tracking_number: tracking_number.into(),
            tracking_url: None,
        }
    }

    /// Adds a tracking URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.tracking_url = Some(url.into());
        self
    }
}

/// An active hold on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldInfo {
    pub reason: String,
    pub held_at: DateTime<Utc>,
}
