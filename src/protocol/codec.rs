//! Topic codec.
//!
//! Stateless translation between broker `(topic, payload)` pairs and
//! domain values.  Inbound grammar:
//!
//! ```text
//! telemetry:  "Unlocked" *          → Unlock
//!             "status-" B "-" L     → Telemetry   (B in fleet, L in 0..=3)
//! command:    DIGIT                 → instruction echo (filtered)
//!             ""                    → blank (filtered)
//!             *                     → CommandEcho
//! ```
//!
//! Outbound, every command except `Raw` is a single decimal instruction on
//! the command topic.

use heapless::String;

use crate::app::commands::{CALIBRATE_INSTRUCTION, Command, DOCK_INSTRUCTION};
use crate::config::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
use crate::error::DecodeError;
use crate::fleet::{BinStatus, Fleet};

use super::{Event, Topics};

const UNLOCK_PREFIX: &str = "Unlocked";
const STATUS_PREFIX: &str = "status";

/// Result of decoding one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A loggable protocol event.
    Event(Event),
    /// The broker reflecting one of our own instructions back.
    InstructionEcho(u8),
    /// An empty payload on the command channel.  Carries nothing.
    Blank,
}

/// An encoded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: String<MAX_PAYLOAD_LEN>,
}

/// Decode an inbound message received at wall-clock time `at`.
pub fn decode(
    topics: &Topics,
    fleet: Fleet,
    topic: &str,
    payload: &[u8],
    at: u64,
) -> Result<Decoded, DecodeError> {
    let is_telemetry = topic == topics.telemetry.as_str();
    let is_command = topic == topics.command.as_str();
    if !is_telemetry && !is_command {
        return Err(DecodeError::UnknownTopic);
    }
    let text = core::str::from_utf8(payload).map_err(|_| DecodeError::Malformed)?;

    if is_telemetry {
        decode_telemetry(fleet, text, at).map(Decoded::Event)
    } else {
        decode_command_channel(text, at)
    }
}

fn decode_telemetry(fleet: Fleet, text: &str, at: u64) -> Result<Event, DecodeError> {
    if text.starts_with(UNLOCK_PREFIX) {
        return Ok(Event::Unlock {
            detail: crate::util::bounded(text),
            at,
        });
    }
    if !text.starts_with(STATUS_PREFIX) {
        return Err(DecodeError::Unrecognized);
    }

    let mut fields = text.split('-');
    let (Some(STATUS_PREFIX), Some(bin), Some(level), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(DecodeError::MalformedStatus);
    };
    let bin = parse_number(bin)?;
    let level = parse_number(level)?;

    let bin = fleet.bin(bin).ok_or(DecodeError::OutOfRange)?;
    let status = BinStatus::from_level(level).ok_or(DecodeError::OutOfRange)?;
    Ok(Event::Telemetry { bin, status, at })
}

/// Digits only; a numeric segment too large for `u32` is out of range.
fn parse_number(segment: &str) -> Result<u32, DecodeError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::MalformedStatus);
    }
    segment.parse().map_err(|_| DecodeError::OutOfRange)
}

fn decode_command_channel(text: &str, at: u64) -> Result<Decoded, DecodeError> {
    match text.as_bytes() {
        [] => Ok(Decoded::Blank),
        [d] if d.is_ascii_digit() => Ok(Decoded::InstructionEcho(d - b'0')),
        _ => Ok(Decoded::Event(Event::CommandEcho {
            raw: crate::util::bounded(text),
            at,
        })),
    }
}

/// Encode a command as the message to publish.
pub fn encode(topics: &Topics, command: &Command) -> Outbound {
    let instruction = |d: u8| {
        let mut payload = String::new();
        // A single digit always fits.
        let _ = payload.push(char::from(b'0' + d));
        Outbound {
            topic: topics.command.clone(),
            payload,
        }
    };
    match command {
        Command::Collect(bin) => instruction(bin.get()),
        Command::Calibrate => instruction(CALIBRATE_INSTRUCTION),
        Command::Dock => instruction(DOCK_INSTRUCTION),
        Command::Raw { topic, payload } => Outbound {
            topic: topic.clone(),
            payload: payload.clone(),
        },
    }
}
