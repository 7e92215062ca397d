//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GatewayCore / worker (domain)
//! ```
//!
//! Driven adapters (broker client, clock, update sinks, storage) implement
//! these traits.  The gateway core and the link supervisor consume them via
//! generics, so nothing in the domain touches the network or flash directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **BrokerPort** never blocks on message delivery: inbound messages are
//!   pushed by the adapter into the worker's link channel.
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::app::events::GatewayUpdate;
use crate::config::GatewayConfig;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain ↔ MQTT broker)
// ───────────────────────────────────────────────────────────────

/// Outbound side of the broker connection.
///
/// Inbound traffic does not go through this trait.  Adapters forward each
/// received message, and every connection loss, through a
/// [`LinkSender`](crate::runtime::LinkSender) so the worker can await them.
pub trait BrokerPort {
    /// Open the transport.  Blocks until the broker accepts or refuses.
    fn connect(&mut self) -> Result<(), TransportError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Publish at-most-once.  Delivery guarantees are the broker's concern.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Close the transport.  Idempotent.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source for the gateway.
///
/// Two clocks: wall time is what gets stamped on events and bin states;
/// the monotonic clock drives timeouts and backoff.
pub trait ClockPort {
    /// Wall-clock milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Update sink port (driven adapter: domain → logging / live clients)
// ───────────────────────────────────────────────────────────────

/// The core emits [`GatewayUpdate`]s through this port.  Adapters decide
/// where they go (serial log, pub/sub channel, test recorder).
pub trait UpdateSink {
    fn emit(&mut self, update: &GatewayUpdate);
}

impl<T: UpdateSink + ?Sized> UpdateSink for &mut T {
    fn emit(&mut self, update: &GatewayUpdate) {
        (**self).emit(update);
    }
}

/// Fan an update out to two sinks.
impl<A: UpdateSink, B: UpdateSink> UpdateSink for (A, B) {
    fn emit(&mut self, update: &GatewayUpdate) {
        self.0.emit(update);
        self.1.emit(update);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists gateway configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`GatewayConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<GatewayConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &GatewayConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
