//! Configuration for the booking console.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Console configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Backend client configuration
    pub api: ApiConfig,
    /// Payment reconciliation polling
    pub reconciliation: ReconciliationConfig,
    /// Idempotency key derivation
    pub idempotency: IdempotencyConfig,
}

/// Backend client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the booking REST API
    pub base_url: String,
    /// Bearer token forwarded on every request
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Payment reconciliation polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Interval between reconciliation ticks (default: 5s)
    pub poll_interval: Duration,
    /// Hard limit after which polling stops with an advisory (default: 30s)
    pub timeout: Duration,
    /// Timeline event type that proves the capture landed (default: `payment.captured`)
    pub expected_event_type: String,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            timeout: Duration::from_millis(30_000),
            expected_event_type: "payment.captured".to_string(),
        }
    }
}

/// Idempotency key configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Width of the time bucket retries share a key within (default: 30s)
    pub window: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// Unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let reconciliation_defaults = ReconciliationConfig::default();
        let parse_u64 = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            api: ApiConfig {
                base_url: lookup("STAYDESK_API_URL")
                    .unwrap_or_else(|| "http://localhost:8080/api".to_string()),
                token: lookup("STAYDESK_API_TOKEN").filter(|t| !t.is_empty()),
                timeout: Duration::from_secs(parse_u64("STAYDESK_API_TIMEOUT_SECS").unwrap_or(15)),
            },
            reconciliation: ReconciliationConfig {
                poll_interval: parse_u64("STAYDESK_POLL_INTERVAL_MS")
                    .filter(|ms| *ms > 0)
                    .map_or(reconciliation_defaults.poll_interval, Duration::from_millis),
                timeout: parse_u64("STAYDESK_RECONCILE_TIMEOUT_MS")
                    .map_or(reconciliation_defaults.timeout, Duration::from_millis),
                expected_event_type: lookup("STAYDESK_CAPTURE_EVENT")
                    .filter(|t| !t.is_empty())
                    .unwrap_or(reconciliation_defaults.expected_event_type),
            },
            idempotency: IdempotencyConfig {
                window: parse_u64("STAYDESK_IDEMPOTENCY_WINDOW_SECS")
                    .filter(|secs| *secs > 0)
                    .map_or(IdempotencyConfig::default().window, Duration::from_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ConsoleConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ConsoleConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]);
        assert_eq!(config.api.base_url, "http://localhost:8080/api");
        assert_eq!(config.api.token, None);
        assert_eq!(config.api.timeout, Duration::from_secs(15));
        assert_eq!(config.reconciliation, ReconciliationConfig::default());
        assert_eq!(config.reconciliation.poll_interval, Duration::from_secs(5));
        assert_eq!(config.reconciliation.timeout, Duration::from_secs(30));
        assert_eq!(config.idempotency.window, Duration::from_secs(30));
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("STAYDESK_API_URL", "https://api.example.test"),
            ("STAYDESK_API_TOKEN", "secret"),
            ("STAYDESK_POLL_INTERVAL_MS", "1000"),
            ("STAYDESK_RECONCILE_TIMEOUT_MS", "60000"),
            ("STAYDESK_CAPTURE_EVENT", "charge.succeeded"),
            ("STAYDESK_IDEMPOTENCY_WINDOW_SECS", "10"),
        ]);
        assert_eq!(config.api.base_url, "https://api.example.test");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.reconciliation.poll_interval, Duration::from_secs(1));
        assert_eq!(config.reconciliation.timeout, Duration::from_secs(60));
        assert_eq!(config.reconciliation.expected_event_type, "charge.succeeded");
        assert_eq!(config.idempotency.window, Duration::from_secs(10));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config_from(&[
            ("STAYDESK_POLL_INTERVAL_MS", "soon"),
            ("STAYDESK_IDEMPOTENCY_WINDOW_SECS", "0"),
            ("STAYDESK_API_TOKEN", ""),
        ]);
        assert_eq!(config.reconciliation.poll_interval, Duration::from_secs(5));
        assert_eq!(config.idempotency.window, Duration::from_secs(30));
        assert_eq!(config.api.token, None);
    }
}
