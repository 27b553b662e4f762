use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::utils::RetryConfig;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read from the environment, every value optional:
// - ORDER_INVENTORY_DATABASE_URL    (default: sqlite::memory:, "memory" for
//                                    the in-process store)
// - ORDER_INVENTORY_METRICS_PORT    (default: 9090)
// - ORDER_INVENTORY_RETRY_ATTEMPTS  (default: 3)
//
// ============================================================================

/// Database URL selecting the in-process store instead of SQLite.
pub const MEMORY_STORE_URL: &str = "memory";

const DATABASE_URL: &str = "ORDER_INVENTORY_DATABASE_URL";
const METRICS_PORT: &str = "ORDER_INVENTORY_METRICS_PORT";
const RETRY_ATTEMPTS: &str = "ORDER_INVENTORY_RETRY_ATTEMPTS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub metrics_port: u16,
    /// Attempts per unit of work when it hits a version conflict
    pub retry_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            metrics_port: 9090,
            retry_attempts: 3,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = lookup(DATABASE_URL).unwrap_or(defaults.database_url);
        let metrics_port = match lookup(METRICS_PORT) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{METRICS_PORT} must be a port number, got {raw:?}"))?,
            None => defaults.metrics_port,
        };
        let retry_attempts = match lookup(RETRY_ATTEMPTS) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{RETRY_ATTEMPTS} must be a positive integer, got {raw:?}"))?,
            None => defaults.retry_attempts,
        };

        if retry_attempts == 0 {
            anyhow::bail!("{RETRY_ATTEMPTS} must be at least 1");
        }

        Ok(Self {
            database_url,
            metrics_port,
            retry_attempts,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_STORE_URL
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_attempts(self.retry_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.retry_config().max_attempts, 3);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL, "sqlite://shop.db"),
            (METRICS_PORT, " 9100 "),
            (RETRY_ATTEMPTS, "5"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "sqlite://shop.db");
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.retry_config().max_attempts, 5);
        assert!(!config.uses_memory_store());

        let memory = AppConfig::from_lookup(lookup(&[(DATABASE_URL, MEMORY_STORE_URL)])).unwrap();
        assert!(memory.uses_memory_store());
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = AppConfig::from_lookup(lookup(&[(METRICS_PORT, "http")])).unwrap_err();
        assert!(err.to_string().contains(METRICS_PORT));

        assert!(AppConfig::from_lookup(lookup(&[(RETRY_ATTEMPTS, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(RETRY_ATTEMPTS, "-2")])).is_err());
    }
}
