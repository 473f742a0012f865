use serde::Deserialize;
use std::time::Duration;

/// Runtime tuning for the pipeline. One instance is constructed at startup
/// and shared by reference; services never read the environment themselves.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Smallest transfer accepted, in minor units (cents).
    pub min_transfer_cents: i64,
    /// Largest single transfer accepted, in minor units. Independent of the
    /// arithmetic overflow bound.
    pub max_transfer_cents: i64,
    /// Per-user per-day ceiling on outgoing internal transfers, minor units.
    pub daily_transfer_ceiling_cents: i64,
    /// Post-transfer source balance below this triggers a warning.
    pub low_balance_threshold_cents: i64,
    /// Income-account balance kept untouched by recommendation generation.
    pub recommendation_buffer_cents: i64,
    /// Purpose strings longer than this draw a warning.
    pub max_purpose_length: usize,

    /// Default wait for advisory lock acquisition, milliseconds.
    pub lock_timeout_ms: u64,
    /// Locks older than this are force-released by the background sweep.
    pub lock_max_age_secs: u64,
    /// Sweep interval, seconds.
    pub lock_sweep_interval_secs: u64,

    /// Consecutive failures before a circuit opens.
    pub breaker_failure_threshold: u32,
    /// Consecutive half-open successes before a circuit closes again.
    pub breaker_success_threshold: u32,
    /// Seconds an open circuit waits before probing half-open.
    pub breaker_recovery_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_transfer_cents: 1,
            max_transfer_cents: 100_000_00,
            daily_transfer_ceiling_cents: 10_000_00,
            low_balance_threshold_cents: 100_00,
            recommendation_buffer_cents: 100_00,
            max_purpose_length: 255,
            lock_timeout_ms: 5_000,
            lock_max_age_secs: 300,
            lock_sweep_interval_secs: 60,
            breaker_failure_threshold: 5,
            breaker_success_threshold: 2,
            breaker_recovery_timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparseable. `.env` files are honored when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        config.min_transfer_cents = env_i64("FIRE_MIN_TRANSFER_CENTS", config.min_transfer_cents);
        config.max_transfer_cents = env_i64("FIRE_MAX_TRANSFER_CENTS", config.max_transfer_cents);
        config.daily_transfer_ceiling_cents = env_i64(
            "FIRE_DAILY_TRANSFER_CEILING_CENTS",
            config.daily_transfer_ceiling_cents,
        );
        config.low_balance_threshold_cents = env_i64(
            "FIRE_LOW_BALANCE_THRESHOLD_CENTS",
            config.low_balance_threshold_cents,
        );
        config.lock_timeout_ms = env_u64("FIRE_LOCK_TIMEOUT_MS", config.lock_timeout_ms);
        config.lock_max_age_secs = env_u64("FIRE_LOCK_MAX_AGE_SECS", config.lock_max_age_secs);
        config
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_max_age(&self) -> Duration {
        Duration::from_secs(self.lock_max_age_secs)
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lock_sweep_interval_secs)
    }

    pub fn breaker_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_timeout_secs)
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
