//! Unified error types for the gateway.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! worker loop's error handling uniform.  All variants are `Copy` so they
//! travel through reply signals and update channels without allocation.
//!
//! Only configuration errors are fatal, and only at startup.  Decode and
//! validation errors are resolved where they occur; transport errors feed
//! the link supervisor's reconnect path.

use core::fmt;

pub use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level gateway error
// ---------------------------------------------------------------------------

/// Every fallible operation in the gateway funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inbound payload failed the protocol grammar or bounds.
    Decode(DecodeError),
    /// An operator command was rejected.
    Validation(ValidationError),
    /// The broker connection failed.
    Transport(TransportError),
    /// The gateway is not currently able to accept commands.
    Unavailable,
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Unavailable => write!(f, "gateway unavailable"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Why an inbound broker message was not turned into an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid UTF-8.
    Malformed,
    /// `status-…` payload without exactly three fields, or a non-numeric segment.
    MalformedStatus,
    /// Bin id outside the fleet, or level outside 0–3.
    OutOfRange,
    /// Payload on the telemetry channel matches no known message.
    Unrecognized,
    /// Message arrived on a topic the gateway does not handle.
    UnknownTopic,
}

impl DecodeError {
    /// Short machine-friendly tag, used in `Ignored` log entries.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::MalformedStatus => "malformed status",
            Self::OutOfRange => "out of range",
            Self::Unrecognized => "unrecognized",
            Self::UnknownTopic => "unknown topic",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Typed rejection of an operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The bin id is not part of the configured fleet.
    UnknownBin,
    /// A Collect was requested without a bin id.
    MissingBin,
    /// A bin id was supplied to a command that does not take one.
    UnexpectedBin,
    /// A raw publish had an empty topic.
    EmptyTopic,
    /// A raw topic or payload exceeds the gateway's bounds.
    TooLong,
    /// A Collect for this bin is still in flight.
    AlreadyPending,
    /// Outbound command budget exhausted.
    RateLimited,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBin => write!(f, "unknown bin"),
            Self::MissingBin => write!(f, "collect requires a bin id"),
            Self::UnexpectedBin => write!(f, "command does not take a bin id"),
            Self::EmptyTopic => write!(f, "raw publish requires a topic"),
            Self::TooLong => write!(f, "raw topic or payload too long"),
            Self::AlreadyPending => write!(f, "collect already pending for bin"),
            Self::RateLimited => write!(f, "command rate limit exceeded"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    ConnectFailed,
    SubscribeFailed,
    PublishFailed,
    NotConnected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::SubscribeFailed => write!(f, "broker subscribe failed"),
            Self::PublishFailed => write!(f, "broker publish failed"),
            Self::NotConnected => write!(f, "broker not connected"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Gateway-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
