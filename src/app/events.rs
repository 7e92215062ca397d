//! Outbound gateway updates.
//!
//! The [`GatewayCore`](super::service::GatewayCore) emits these through the
//! [`UpdateSink`](super::ports::UpdateSink) port whenever observable state
//! changes.  Adapters on the other side decide what to do with them: log
//! to serial, fan out to live UI subscribers, record in tests.

use crate::event_log::LogEntry;
use crate::fleet::BinState;
use crate::link::LinkState;

/// Structured change notifications emitted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayUpdate {
    /// A bin's state was replaced (telemetry or operator reset).
    BinChanged(BinState),

    /// An entry was appended to the event log.
    Logged(LogEntry),

    /// The broker link moved to a new state.
    LinkChanged(LinkState),
}
