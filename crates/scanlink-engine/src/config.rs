//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time to wait for a mode-change acknowledgement (milliseconds).
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 3_000;
/// Default bound on a single transport write (milliseconds).
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1_000;
/// Default time allowed for the read loop to stop on shutdown (milliseconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 1_000;

/// Configuration for the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a trigger scan may wait for a decode. `None` waits until the
    /// caller cancels.
    pub scan_timeout_ms: Option<u64>,
    /// How long a mode change may wait for the acknowledgement.
    pub ack_timeout_ms: Option<u64>,
    /// Bound on a single write to the transport.
    pub write_timeout_ms: u64,
    /// How long shutdown waits for the read loop before aborting it.
    pub shutdown_timeout_ms: u64,
    /// Send a deactivate command when a scan is cancelled or times out.
    pub deactivate_on_abort: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            scan_timeout_ms: None,
            ack_timeout_ms: Some(DEFAULT_ACK_TIMEOUT_MS),
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            deactivate_on_abort: true,
        }
    }
}

impl EngineConfig {
    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Set the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scan_timeout_ms = timeout.map(duration_to_ms);
        self
    }

    /// Set the acknowledgement timeout.
    pub fn with_ack_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ack_timeout_ms = timeout.map(duration_to_ms);
        self
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.scan_timeout(), None);
        assert_eq!(config.ack_timeout(), Some(Duration::from_secs(3)));
        assert!(config.deactivate_on_abort);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("scan_timeout_ms: 5000\n").unwrap();
        assert_eq!(config.scan_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.write_timeout_ms, DEFAULT_WRITE_TIMEOUT_MS);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_scan_timeout(Some(Duration::from_millis(250)))
            .with_ack_timeout(None);
        assert_eq!(config.scan_timeout_ms, Some(250));
        assert_eq!(config.ack_timeout(), None);
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = EngineConfig::default().with_scan_timeout(Some(Duration::MAX));
        assert_eq!(config.scan_timeout_ms, Some(u64::MAX));
    }
}
