//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Tuning knobs for the inventory engine and its background workers.
///
/// Reads from environment variables:
/// - `ALLOCATION_TTL_SECS` — lifetime of a pending allocation (default: `900`)
/// - `MAX_CONFLICT_RETRIES` — optimistic write attempts per operation (default: `8`)
/// - `SWEEPER_INTERVAL_SECS` — expiry sweep period (default: `30`)
/// - `OUTBOX_INTERVAL_SECS` — outbox drain period (default: `2`)
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub default_allocation_ttl: Duration,
    pub max_conflict_retries: u32,
    pub sweeper_interval: Duration,
    pub sweeper_batch_size: usize,
    pub outbox_interval: Duration,
    pub outbox_batch_size: usize,
    pub outbox_max_attempts: u32,
}

impl InventoryConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_allocation_ttl: env_secs("ALLOCATION_TTL_SECS")
                .unwrap_or(defaults.default_allocation_ttl),
            max_conflict_retries: std::env::var("MAX_CONFLICT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(defaults.max_conflict_retries),
            sweeper_interval: env_secs("SWEEPER_INTERVAL_SECS")
                .unwrap_or(defaults.sweeper_interval),
            outbox_interval: env_secs("OUTBOX_INTERVAL_SECS").unwrap_or(defaults.outbox_interval),
            ..defaults
        }
    }

    /// Allocation TTL as a chrono duration, for timestamp arithmetic.
    pub fn allocation_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.default_allocation_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(15))
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            default_allocation_ttl: Duration::from_secs(15 * 60),
            max_conflict_retries: 8,
            sweeper_interval: Duration::from_secs(30),
            sweeper_batch_size: 500,
            outbox_interval: Duration::from_secs(2),
            outbox_batch_size: 100,
            outbox_max_attempts: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = InventoryConfig::default();
        assert_eq!(config.default_allocation_ttl, Duration::from_secs(900));
        assert_eq!(config.max_conflict_retries, 8);
        assert_eq!(config.sweeper_interval, Duration::from_secs(30));
        assert_eq!(config.outbox_batch_size, 100);
    }

    #[test]
    fn allocation_ttl_converts_to_chrono() {
        let config = InventoryConfig {
            default_allocation_ttl: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(config.allocation_ttl(), chrono::Duration::seconds(60));
    }
}
