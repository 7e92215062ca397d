//! Gateway configuration parameters
//!
//! All tunable parameters for the bin fleet gateway.  Defaults match the
//! dashboard's protocol constants; values can be overridden via NVS.
//! Configuration is immutable once the worker has started.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::fleet::{Fleet, MAX_FLEET_SIZE};

/// Capacity of the audit event log.  Oldest entries are evicted first.
pub const EVENT_LOG_CAPACITY: usize = 500;

/// Depth of the worker's command inbox.
pub const INBOX_DEPTH: usize = 8;

/// Depth of the adapter → worker broker message channel.
pub const LINK_DEPTH: usize = 16;

/// Live-update channel depth and subscriber limit.
pub const UPDATE_DEPTH: usize = 32;
pub const MAX_UPDATE_SUBSCRIBERS: usize = 4;

/// Maximum topic length accepted on either side of the broker.
pub const MAX_TOPIC_LEN: usize = 64;

/// Maximum payload length carried through the gateway.
pub const MAX_PAYLOAD_LEN: usize = 128;

/// Core gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    // --- Broker ---
    /// Broker URL, e.g. `mqtt://broker.local`
    pub broker_url: String<96>,
    pub broker_port: u16,
    pub client_id: String<32>,
    pub username: String<32>,
    pub password: String<64>,

    // --- Topics ---
    /// Device → gateway telemetry channel
    pub telemetry_topic: String<MAX_TOPIC_LEN>,
    /// Bidirectional command channel
    pub command_topic: String<MAX_TOPIC_LEN>,

    // --- Fleet ---
    /// Number of bins, ids `1..=fleet_size`
    pub fleet_size: u8,
    /// Seconds before an unacknowledged Collect stops blocking the bin
    pub pending_timeout_secs: u32,

    // --- Link backoff ---
    pub backoff_base_ms: u32,
    pub backoff_max_ms: u32,
    /// Random jitter added to each delay, as a percentage of it
    pub backoff_jitter_percent: u8,

    // --- Outbound rate limit ---
    /// Commands per second, also the burst size
    pub command_rate_per_sec: u32,

    // --- Timing ---
    pub housekeeping_interval_ms: u32,
    /// How long `shutdown()` waits for the worker before giving up
    pub shutdown_grace_ms: u32,
    /// How long a client waits for the worker to take a request.  A request
    /// still queued at the deadline is withdrawn and never executed.
    pub reply_timeout_ms: u32,

    // --- Device ---
    pub http_port: u16,
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker_url: crate::util::bounded("mqtt://localhost"),
            broker_port: 1883,
            client_id: crate::util::bounded("binfleet-gateway"),
            username: String::new(),
            password: String::new(),

            telemetry_topic: crate::util::bounded("trash_collector_main"),
            command_topic: crate::util::bounded("trash_collector_sub"),

            fleet_size: 5,
            pending_timeout_secs: 300,

            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
            backoff_jitter_percent: 20,

            command_rate_per_sec: 5,

            housekeeping_interval_ms: 1_000,
            shutdown_grace_ms: 2_000,
            reply_timeout_ms: 5_000,

            http_port: 80,
            wifi_ssid: String::new(),
            wifi_password: String::new(),
        }
    }
}

impl GatewayConfig {
    /// The configured fleet.  Call after [`validate`](Self::validate).
    pub fn fleet(&self) -> Fleet {
        Fleet::new(self.fleet_size)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_url.is_empty() {
            return Err(ConfigError::ValidationFailed("broker_url must not be empty"));
        }
        if self.broker_port == 0 {
            return Err(ConfigError::ValidationFailed("broker_port must be non-zero"));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::ValidationFailed("client_id must not be empty"));
        }
        if self.telemetry_topic.is_empty() || self.command_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("topics must not be empty"));
        }
        if self.telemetry_topic == self.command_topic {
            return Err(ConfigError::ValidationFailed(
                "telemetry_topic and command_topic must differ",
            ));
        }
        if !(1..=MAX_FLEET_SIZE).contains(&self.fleet_size) {
            return Err(ConfigError::ValidationFailed("fleet_size must be 1–8"));
        }
        if !(1..=86_400).contains(&self.pending_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "pending_timeout_secs must be 1–86400",
            ));
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::ValidationFailed("backoff_base_ms must be non-zero"));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::ValidationFailed(
                "backoff_max_ms must be >= backoff_base_ms",
            ));
        }
        if self.backoff_jitter_percent > 100 {
            return Err(ConfigError::ValidationFailed(
                "backoff_jitter_percent must be 0–100",
            ));
        }
        if !(1..=100).contains(&self.command_rate_per_sec) {
            return Err(ConfigError::ValidationFailed(
                "command_rate_per_sec must be 1–100",
            ));
        }
        if !(100..=60_000).contains(&self.housekeeping_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "housekeeping_interval_ms must be 100–60000",
            ));
        }
        if !(100..=60_000).contains(&self.reply_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "reply_timeout_ms must be 100–60000",
            ));
        }
        if self.http_port == 0 {
            return Err(ConfigError::ValidationFailed("http_port must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = GatewayConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.telemetry_topic.as_str(), "trash_collector_main");
        assert_eq!(c.command_topic.as_str(), "trash_collector_sub");
        assert_eq!(c.fleet().size(), 5);
        assert_eq!(c.pending_timeout_secs, 300);
    }

    #[test]
    fn rejects_oversized_fleet() {
        let mut c = GatewayConfig::default();
        c.fleet_size = 9;
        assert_eq!(
            c.validate(),
            Err(ConfigError::ValidationFailed("fleet_size must be 1–8"))
        );
        c.fleet_size = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_inverted_backoff() {
        let mut c = GatewayConfig::default();
        c.backoff_max_ms = c.backoff_base_ms - 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_shared_topic() {
        let mut c = GatewayConfig::default();
        c.command_topic = c.telemetry_topic.clone();
        assert!(c.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let c = GatewayConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let mut c = GatewayConfig::default();
        c.fleet_size = 8;
        c.username = crate::util::bounded("operator");
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: GatewayConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }
}
