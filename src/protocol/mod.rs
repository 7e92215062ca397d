//! Wire protocol between the gateway, the bins and the collector robot.
//!
//! Two broker topics carry short ASCII strings:
//!
//! ```text
//!  telemetry  (device → gateway)   "status-<bin>-<level>" | "Unlocked..."
//!  command    (both directions)    "0" Calibrate | "9" Dock | "<bin>" Collect
//!                                  | free text echoed by the robot
//! ```
//!
//! [`codec`] turns those strings into typed [`Event`]s and back.

pub mod codec;

use core::fmt;

use heapless::String;
use serde::Serialize;

use crate::app::commands::CommandKind;
use crate::config::{GatewayConfig, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::error::DecodeError;
use crate::fleet::{BinId, BinStatus};

pub use codec::{Decoded, Outbound, decode, encode};

/// The two topic names the gateway subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub telemetry: String<MAX_TOPIC_LEN>,
    pub command: String<MAX_TOPIC_LEN>,
}

impl Topics {
    pub fn new(telemetry: &str, command: &str) -> Self {
        Self {
            telemetry: crate::util::bounded(telemetry),
            command: crate::util::bounded(command),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            telemetry: config.telemetry_topic.clone(),
            command: config.command_topic.clone(),
        }
    }

    /// Both topics, in subscription order.
    pub fn all(&self) -> [&str; 2] {
        [self.telemetry.as_str(), self.command.as_str()]
    }
}

/// Which way a logged event travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Device → gateway.
    #[serde(rename = ">>>")]
    Inbound,
    /// Operator → device.
    #[serde(rename = "<<<")]
    Outbound,
}

impl Direction {
    pub const fn arrow(self) -> &'static str {
        match self {
            Self::Inbound => ">>>",
            Self::Outbound => "<<<",
        }
    }
}

/// A protocol event as recorded in the event log.
///
/// `at` is wall-clock milliseconds since the Unix epoch.  It is carried as
/// data only; log order is by arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A bin reported its fill level.
    Telemetry {
        bin: BinId,
        status: BinStatus,
        at: u64,
    },
    /// The robot reported an unlock.
    Unlock {
        detail: String<MAX_PAYLOAD_LEN>,
        at: u64,
    },
    /// The gateway published an operator command.
    CommandIssued {
        kind: CommandKind,
        bin: Option<BinId>,
        at: u64,
    },
    /// Human-readable text on the command channel.
    CommandEcho {
        raw: String<MAX_PAYLOAD_LEN>,
        at: u64,
    },
    /// An inbound payload that was dropped.
    Ignored {
        raw: String<MAX_PAYLOAD_LEN>,
        reason: DecodeError,
        at: u64,
    },
}

impl Event {
    pub fn at(&self) -> u64 {
        match self {
            Self::Telemetry { at, .. }
            | Self::Unlock { at, .. }
            | Self::CommandIssued { at, .. }
            | Self::CommandEcho { at, .. }
            | Self::Ignored { at, .. } => *at,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::CommandIssued { .. } => Direction::Outbound,
            _ => Direction::Inbound,
        }
    }

    /// Build an `Ignored` record from a rejected payload.
    pub fn ignored(payload: &[u8], reason: DecodeError, at: u64) -> Self {
        Self::Ignored {
            raw: crate::util::bounded(&std::string::String::from_utf8_lossy(payload)),
            reason,
            at,
        }
    }
}

/// Dashboard text for the event.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry { bin, status, .. } => write!(f, "Bin {}: {}", bin, status.label()),
            Self::Unlock { detail, .. } => f.write_str(detail),
            Self::CommandIssued { kind, bin, .. } => match (kind, bin) {
                (CommandKind::Collect, Some(bin)) => write!(f, "Collecting bin {bin}"),
                (CommandKind::Collect, None) => f.write_str("Collecting"),
                (CommandKind::Calibrate, _) => f.write_str("Calibrating"),
                (CommandKind::Dock, _) => f.write_str("Docking"),
                (CommandKind::Raw, _) => f.write_str("Raw publish"),
            },
            Self::CommandEcho { raw, .. } => f.write_str(raw),
            Self::Ignored { raw, reason, .. } => write!(f, "ignored: {raw} ({reason})"),
        }
    }
}
