//! Operator commands accepted by the gateway.
//!
//! Clients send a loosely-typed [`CommandRequest`] (JSON body of
//! `POST /command`).  It is validated against the fleet into a
//! [`Command`] before it ever reaches the worker, so the dispatcher only
//! deals with well-formed commands.

use core::fmt;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::error::ValidationError;
use crate::fleet::{BinId, Fleet};

/// Wire instruction for Calibrate on the command channel.
pub const CALIBRATE_INSTRUCTION: u8 = 0;
/// Wire instruction for Dock on the command channel.
pub const DOCK_INSTRUCTION: u8 = 9;

/// Discriminant of a [`Command`], as reported back to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Collect,
    Calibrate,
    Dock,
    Raw,
}

impl CommandKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collect => "collect",
            Self::Calibrate => "calibrate",
            Self::Dock => "dock",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the collector robot to a bin.
    Collect(BinId),
    /// Recalibrate the robot.
    Calibrate,
    /// Return the robot to its dock.
    Dock,
    /// Publish an arbitrary payload (diagnostics / administration).
    Raw {
        topic: String<MAX_TOPIC_LEN>,
        payload: String<MAX_PAYLOAD_LEN>,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Collect(_) => CommandKind::Collect,
            Self::Calibrate => CommandKind::Calibrate,
            Self::Dock => CommandKind::Dock,
            Self::Raw { .. } => CommandKind::Raw,
        }
    }

    /// Target bin, for commands that have one.
    pub fn bin(&self) -> Option<BinId> {
        match self {
            Self::Collect(bin) => Some(*bin),
            _ => None,
        }
    }

    /// Validate a client request against the fleet.
    pub fn from_request(req: &CommandRequest, fleet: Fleet) -> Result<Self, ValidationError> {
        if req.kind != CommandKind::Collect && req.bin_id.is_some() {
            return Err(ValidationError::UnexpectedBin);
        }
        match req.kind {
            CommandKind::Collect => {
                let raw = req.bin_id.ok_or(ValidationError::MissingBin)?;
                fleet
                    .bin(raw)
                    .map(Self::Collect)
                    .ok_or(ValidationError::UnknownBin)
            }
            CommandKind::Calibrate => Ok(Self::Calibrate),
            CommandKind::Dock => Ok(Self::Dock),
            CommandKind::Raw => {
                let topic = req.topic.as_deref().unwrap_or("");
                if topic.is_empty() {
                    return Err(ValidationError::EmptyTopic);
                }
                let payload = req.payload.as_deref().unwrap_or("");
                Ok(Self::Raw {
                    topic: String::try_from(topic).map_err(|()| ValidationError::TooLong)?,
                    payload: String::try_from(payload).map_err(|()| ValidationError::TooLong)?,
                })
            }
        }
    }

    /// The command whose published instruction is the digit `d`.
    ///
    /// `0` is Calibrate, `9` is Dock and a fleet member's id is Collect.
    pub fn from_instruction(d: u8, fleet: Fleet) -> Option<Self> {
        match d {
            CALIBRATE_INSTRUCTION => Some(Self::Calibrate),
            DOCK_INSTRUCTION => Some(Self::Dock),
            other => fleet.bin(u32::from(other)).map(Self::Collect),
        }
    }
}

/// Unvalidated command as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub kind: CommandKind,
    #[serde(default)]
    pub bin_id: Option<u32>,
    #[serde(default)]
    pub topic: Option<std::string::String>,
    #[serde(default)]
    pub payload: Option<std::string::String>,
}

impl CommandRequest {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            bin_id: None,
            topic: None,
            payload: None,
        }
    }

    pub fn collect(bin_id: u32) -> Self {
        Self {
            bin_id: Some(bin_id),
            ..Self::new(CommandKind::Collect)
        }
    }

    pub fn raw(topic: &str, payload: &str) -> Self {
        Self {
            topic: Some(topic.into()),
            payload: Some(payload.into()),
            ..Self::new(CommandKind::Raw)
        }
    }
}
