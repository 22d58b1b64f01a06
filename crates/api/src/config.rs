//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use fulfillment_sync::SyncSettings;

/// Server and batch configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `SYNC_CONCURRENCY`: orders in flight per batch (default: `8`)
/// - `SYNC_MAX_ATTEMPTS`: provider attempts per order (default: `3`)
/// - `SYNC_ATTEMPT_TIMEOUT_MS`: deadline per provider call (default: `5000`)
/// - `SYNC_RETRY_BACKOFF_MS`: base delay between attempts (default: `200`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub sync_concurrency: usize,
    pub sync_max_attempts: u32,
    pub sync_attempt_timeout_ms: u64,
    pub sync_retry_backoff_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            sync_concurrency: parse_var(&lookup, "SYNC_CONCURRENCY")
                .unwrap_or(defaults.sync_concurrency),
            sync_max_attempts: parse_var(&lookup, "SYNC_MAX_ATTEMPTS")
                .unwrap_or(defaults.sync_max_attempts),
            sync_attempt_timeout_ms: parse_var(&lookup, "SYNC_ATTEMPT_TIMEOUT_MS")
                .unwrap_or(defaults.sync_attempt_timeout_ms),
            sync_retry_backoff_ms: parse_var(&lookup, "SYNC_RETRY_BACKOFF_MS")
                .unwrap_or(defaults.sync_retry_backoff_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Batch limits for bulk operations and provider syncs.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings::default()
            .with_concurrency(self.sync_concurrency)
            .with_max_attempts(self.sync_max_attempts)
            .with_attempt_timeout(Duration::from_millis(self.sync_attempt_timeout_ms))
            .with_retry_backoff(Duration::from_millis(self.sync_retry_backoff_ms))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            sync_concurrency: 8,
            sync_max_attempts: 3,
            sync_attempt_timeout_ms: 5000,
            sync_retry_backoff_ms: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sync_settings(), SyncSettings::default());
    }

    #[test]
    fn test_addr_formatting() {
        let config = config_from(&[("HOST", "127.0.0.1"), ("PORT", "8080")]);
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_sync_overrides() {
        let config = config_from(&[
            ("SYNC_CONCURRENCY", "2"),
            ("SYNC_MAX_ATTEMPTS", "5"),
            ("SYNC_ATTEMPT_TIMEOUT_MS", "750"),
            ("SYNC_RETRY_BACKOFF_MS", "10"),
        ]);
        let settings = config.sync_settings();
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.attempt_timeout, Duration::from_millis(750));
        assert_eq!(settings.retry_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[("PORT", "not-a-port"), ("SYNC_CONCURRENCY", "-4")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.sync_concurrency, 8);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = config_from(&[("SYNC_CONCURRENCY", "0"), ("SYNC_MAX_ATTEMPTS", "0")]);
        let settings = config.sync_settings();
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.max_attempts, 1);
    }
}
