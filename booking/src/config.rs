//! Configuration for booking sessions.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::pricing::BookingFee;
use seatflow_runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Booking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// How long a submission may go unanswered before it counts as failed (ms)
    pub submit_timeout_ms: u64,
    /// How long one snapshot read may take (ms)
    pub snapshot_timeout_ms: u64,
    /// Retries for a failed snapshot read
    pub snapshot_max_retries: u32,
    /// Delay before the first snapshot retry (ms), doubled per retry
    pub snapshot_retry_delay_ms: u64,
    /// Booking fee in basis points
    pub fee_bps: u32,
    /// Events retained for a lagging event bus subscriber
    pub event_bus_capacity: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 10_000,
            snapshot_timeout_ms: 5_000,
            snapshot_max_retries: 2,
            snapshot_retry_delay_ms: 100,
            fee_bps: BookingFee::DEFAULT_BPS,
            event_bus_capacity: 64,
        }
    }
}

impl BookingConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            submit_timeout_ms: env::var("BOOKING_SUBMIT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.submit_timeout_ms),
            snapshot_timeout_ms: env::var("BOOKING_SNAPSHOT_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.snapshot_timeout_ms),
            snapshot_max_retries: env::var("BOOKING_SNAPSHOT_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.snapshot_max_retries),
            snapshot_retry_delay_ms: env::var("BOOKING_SNAPSHOT_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.snapshot_retry_delay_ms),
            fee_bps: env::var("BOOKING_FEE_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fee_bps),
            event_bus_capacity: env::var("BOOKING_EVENT_BUS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_bus_capacity),
        }
    }

    /// Submission timeout
    #[must_use]
    pub const fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Timeout for one snapshot read
    #[must_use]
    pub const fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    /// Retry policy for snapshot reads
    #[must_use]
    pub fn snapshot_retry(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.snapshot_max_retries)
            .initial_delay(Duration::from_millis(self.snapshot_retry_delay_ms))
            .build()
    }

    /// Booking fee
    #[must_use]
    pub const fn fee(&self) -> BookingFee {
        BookingFee::from_bps(self.fee_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BookingConfig::default();
        assert_eq!(config.submit_timeout(), Duration::from_secs(10));
        assert_eq!(config.fee(), BookingFee::default());
        assert_eq!(config.snapshot_retry().max_retries, 2);
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        // Nothing in the test environment sets BOOKING_* variables.
        assert_eq!(BookingConfig::from_env(), BookingConfig::default());
    }
}
