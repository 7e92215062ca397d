//! Log-based update sink adapter.
//!
//! Implements [`UpdateSink`] by writing every gateway update to the
//! ESP-IDF logger (UART / USB-CDC on the board, stderr on the host).

use log::{info, warn};

use crate::app::events::GatewayUpdate;
use crate::app::ports::UpdateSink;
use crate::link::LinkState;
use crate::protocol::Event;

/// Adapter that logs every [`GatewayUpdate`] to the serial console.
#[derive(Debug, Default)]
pub struct LogUpdateSink;

impl LogUpdateSink {
    pub fn new() -> Self {
        Self
    }
}

impl UpdateSink for LogUpdateSink {
    fn emit(&mut self, update: &GatewayUpdate) {
        match update {
            GatewayUpdate::BinChanged(b) => {
                info!(
                    "BIN   | id={} | status={} | at={}",
                    b.id,
                    b.status.label(),
                    b.last_updated.unwrap_or(0),
                );
            }
            GatewayUpdate::Logged(entry) => match &entry.event {
                Event::Ignored { .. } => {
                    warn!("EVENT | #{} {} {}", entry.seq, entry.event.direction().arrow(), entry.event);
                }
                event => {
                    info!("EVENT | #{} {} {}", entry.seq, event.direction().arrow(), event);
                }
            },
            GatewayUpdate::LinkChanged(LinkState::Degraded { attempt }) => {
                warn!("LINK  | degraded, attempt={}", attempt);
            }
            GatewayUpdate::LinkChanged(state) => {
                info!("LINK  | {}", state.as_str());
            }
        }
    }
}
