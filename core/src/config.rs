//! Relay configuration
//!
//! Consumed once at startup. Defaults match the reference deployment.

use crate::messaging::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::time::zone::ZoneInfo;
use crate::time::zonedb::find_zone;

/// Station link credentials
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub ssid: &'static str,
    pub password: &'static str,
    /// Supervision passes to wait for an association before retrying
    pub associate_timeout_passes: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ssid: "SSID2",
            password: "!@#$%%12345",
            associate_timeout_passes: 50,
        }
    }
}

/// Internet reachability probe target
#[derive(Debug, Clone)]
pub struct ReachabilityConfig {
    pub probe_host: &'static str,
    pub probe_port: u16,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            probe_host: "www.google.com",
            probe_port: 80,
        }
    }
}

/// Clock sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub server: &'static str,
    /// Zone the clock source reports in
    pub source_zone: &'static str,
    /// Zone local readings are corrected to
    pub target_zone: &'static str,
    pub poll_interval_ms: u32,
    pub timeout_ms: u32,
    /// Readings at or below this are treated as an unsynced clock
    pub valid_after_unix: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server: "time.nist.gov",
            source_zone: "Asia/Shanghai",
            target_zone: "Asia/Colombo",
            poll_interval_ms: 100,
            timeout_ms: 500,
            valid_after_unix: 905_536_800,
        }
    }
}

/// Broker session configuration
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub broker_host: &'static str,
    pub port: u16,
    pub connect_timeout_ms: u32,
    pub keep_alive_secs: u16,
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
    pub subscribe_topic: &'static str,
    pub publish_topic: &'static str,
    /// Pause before each publish and between producer gating checks
    pub publish_settle_ms: u32,
    pub subscribe_retry_ms: u32,
    /// Publish and subscribe attempts per cycle
    pub max_retry: u8,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            broker_host: "test.mosquitto.org",
            port: 1883,
            connect_timeout_ms: 5000,
            keep_alive_secs: 10,
            username: None,
            password: None,
            subscribe_topic: "lihini/outgo",
            publish_topic: "lihini/income",
            publish_settle_ms: 10,
            subscribe_retry_ms: 100,
            max_retry: 3,
        }
    }
}

/// Queue bounds
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub capacity: usize,
    /// Evict when free memory drops below this
    pub memory_threshold_bytes: usize,
    pub total_memory_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            memory_threshold_bytes: 200,
            total_memory_bytes: 16_000,
        }
    }
}

/// Supervision and duty pacing
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub interval_ms: u32,
    pub network_pass_ms: u32,
    pub messaging_pass_ms: u32,
    pub indication_tick_ms: u32,
    pub slow_pulse_ticks: u16,
    pub quick_pulse_ticks: u16,
    pub error_blink_ms: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            network_pass_ms: 100,
            messaging_pass_ms: 100,
            indication_tick_ms: 1,
            slow_pulse_ticks: 100,
            quick_pulse_ticks: 10,
            error_blink_ms: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub prefix: &'static str,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { prefix: "lihini" }
    }
}

/// Built-in telemetry producer pacing
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub interval_ms: u32,
    pub startup_delay_ms: u32,
    /// Gating checks before enqueueing regardless of the messaging phase
    pub max_gate_checks: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            startup_delay_ms: 1000,
            max_gate_checks: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub link: LinkConfig,
    pub reachability: ReachabilityConfig,
    pub sync: SyncConfig,
    pub messaging: MessagingConfig,
    pub queue: QueueConfig,
    pub supervisor: SupervisorConfig,
    pub identity: IdentityConfig,
    pub telemetry: TelemetryConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Queue capacity is zero or above the compile-time bound
    QueueCapacity,
    /// Retry ceiling is zero
    RetryCeiling,
    /// Zone identifier not in the database
    UnknownZone,
    /// Topic exceeds the topic bound
    TopicTooLong,
    /// Sync poll interval is zero
    PollInterval,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::QueueCapacity => write!(f, "Invalid queue capacity"),
            Self::RetryCeiling => write!(f, "Retry ceiling must be non-zero"),
            Self::UnknownZone => write!(f, "Unknown time zone"),
            Self::TopicTooLong => write!(f, "Topic too long"),
            Self::PollInterval => write!(f, "Poll interval must be non-zero"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Zones named by a validated [`SyncConfig`]
#[derive(Debug, Clone, Copy)]
pub struct SyncZones {
    pub source: &'static ZoneInfo,
    pub target: &'static ZoneInfo,
}

impl SyncConfig {
    pub fn zones(&self) -> Result<SyncZones, ConfigError> {
        Ok(SyncZones {
            source: find_zone(self.source_zone).ok_or(ConfigError::UnknownZone)?,
            target: find_zone(self.target_zone).ok_or(ConfigError::UnknownZone)?,
        })
    }
}

impl RelayConfig {
    /// Check the settings against the queue bound `max_queue`
    pub fn validate(&self, max_queue: usize) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 || self.queue.capacity > max_queue {
            return Err(ConfigError::QueueCapacity);
        }
        if self.messaging.max_retry == 0 {
            return Err(ConfigError::RetryCeiling);
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(ConfigError::PollInterval);
        }
        self.sync.zones()?;
        if self.messaging.subscribe_topic.len() > MAX_TOPIC_LEN
            || self.messaging.publish_topic.len() > MAX_TOPIC_LEN
        {
            return Err(ConfigError::TopicTooLong);
        }
        debug!("Config valid (payload bound {})", MAX_PAYLOAD_LEN);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert_eq!(RelayConfig::default().validate(50), Ok(()));
    }

    #[test]
    fn test_default_values() {
        let config = RelayConfig::default();
        assert_eq!(config.messaging.port, 1883);
        assert_eq!(config.messaging.max_retry, 3);
        assert_eq!(config.queue.capacity, 50);
        assert_eq!(config.sync.valid_after_unix, 905_536_800);
        assert_eq!(config.supervisor.interval_ms, 1000);
    }

    #[test]
    fn test_rejects_capacity_above_bound() {
        let mut config = RelayConfig::default();
        config.queue.capacity = 64;
        assert_eq!(config.validate(50), Err(ConfigError::QueueCapacity));
        config.queue.capacity = 0;
        assert_eq!(config.validate(50), Err(ConfigError::QueueCapacity));
    }

    #[test]
    fn test_rejects_unknown_zone() {
        let mut config = RelayConfig::default();
        config.sync.target_zone = "Asia/Atlantis";
        assert_eq!(config.validate(50), Err(ConfigError::UnknownZone));
    }

    #[test]
    fn test_rejects_zero_retry() {
        let mut config = RelayConfig::default();
        config.messaging.max_retry = 0;
        assert_eq!(config.validate(50), Err(ConfigError::RetryCeiling));
    }

    #[test]
    fn test_rejects_long_topic() {
        let mut config = RelayConfig::default();
        config.messaging.publish_topic =
            "telemetry/devices/relay/a-rather-long-site-name/readings";
        assert_eq!(config.validate(50), Err(ConfigError::TopicTooLong));
    }
}
