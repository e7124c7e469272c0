//! Runtime driver configuration.
//!
//! Both knobs are settable while the driver is running, from any task, so
//! they live in atomics rather than behind the buffer or TX locks. Reads
//! are advisory; a setter racing a reader is harmless.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

/// Smallest accepted response timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Largest accepted response timeout (exclusive bound of 5 s).
pub const MAX_TIMEOUT: Duration = Duration::from_millis(4999);

/// Default single-step response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Bounds and default for the consecutive transmit-failure threshold.
pub const MIN_FAILED_TRANSMITS: u32 = 1;
pub const MAX_FAILED_TRANSMITS: u32 = 19;
pub const DEFAULT_FAILED_TRANSMITS: u32 = 5;

/// Shared, runtime-mutable driver settings.
#[derive(Debug)]
pub struct DriverConfig {
    timeout_ms: AtomicU64,
    max_failed_transmits: AtomicU32,
}

impl DriverConfig {
    /// Create a config, clamping both values into their accepted ranges.
    pub fn new(timeout: Duration, max_failed_transmits: u32) -> Self {
        let config = DriverConfig {
            timeout_ms: AtomicU64::new(DEFAULT_TIMEOUT.as_millis() as u64),
            max_failed_transmits: AtomicU32::new(DEFAULT_FAILED_TRANSMITS),
        };
        config.set_timeout(timeout);
        config.set_max_failed_transmits(max_failed_transmits);
        config
    }

    /// The single-step response timeout. Composite operations multiply
    /// this (2x for responses, 10x for node lookup, 5x for the buffer
    /// hand-off).
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// Set the response timeout, clamped to `[1 ms, 5 s)`.
    pub fn set_timeout(&self, timeout: Duration) {
        let clamped = timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        if clamped != timeout {
            debug!(requested_ms = timeout.as_millis() as u64, "timeout clamped");
        }
        self.timeout_ms
            .store(clamped.as_millis() as u64, Ordering::Relaxed);
    }

    /// Consecutive delivery failures tolerated before the driver forces a
    /// disassociation.
    pub fn max_failed_transmits(&self) -> u32 {
        self.max_failed_transmits.load(Ordering::Relaxed)
    }

    /// Set the failure threshold, clamped to `1..=19`.
    pub fn set_max_failed_transmits(&self, max: u32) {
        let clamped = max.clamp(MIN_FAILED_TRANSMITS, MAX_FAILED_TRANSMITS);
        if clamped != max {
            debug!(requested = max, "max failed transmits clamped");
        }
        self.max_failed_transmits.store(clamped, Ordering::Relaxed);
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig::new(DEFAULT_TIMEOUT, DEFAULT_FAILED_TRANSMITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(1000));
        assert_eq!(config.max_failed_transmits(), 5);
    }

    #[test]
    fn timeout_clamps_low_and_high() {
        let config = DriverConfig::default();
        config.set_timeout(Duration::ZERO);
        assert_eq!(config.timeout(), MIN_TIMEOUT);
        config.set_timeout(Duration::from_secs(60));
        assert_eq!(config.timeout(), MAX_TIMEOUT);
        config.set_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn max_failed_transmits_clamps() {
        let config = DriverConfig::default();
        config.set_max_failed_transmits(0);
        assert_eq!(config.max_failed_transmits(), 1);
        config.set_max_failed_transmits(100);
        assert_eq!(config.max_failed_transmits(), 19);
        config.set_max_failed_transmits(3);
        assert_eq!(config.max_failed_transmits(), 3);
    }
}
