//! Read-side copy of gateway state.
//!
//! The worker keeps one [`Snapshot`] in the shared view and patches it
//! with every [`GatewayUpdate`], so request handlers read state without
//! ever touching the core.

use std::collections::VecDeque;

use crate::event_log::LogEntry;
use crate::fleet::BinState;
use crate::link::LinkState;

use super::events::GatewayUpdate;

/// Number of recent log entries carried in a snapshot.
pub const SNAPSHOT_EVENT_TAIL: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Every bin, ordered by id.
    pub bins: Vec<BinState>,
    /// Most recent log entries, oldest first.
    pub events: VecDeque<LogEntry>,
    pub link: LinkState,
    pub pending_collects: usize,
    pub log_len: usize,
}

impl Snapshot {
    pub fn apply(&mut self, update: &GatewayUpdate) {
        match update {
            GatewayUpdate::BinChanged(state) => {
                if let Some(slot) = self.bins.iter_mut().find(|b| b.id == state.id) {
                    *slot = *state;
                }
            }
            GatewayUpdate::Logged(entry) => {
                if self.events.len() == SNAPSHOT_EVENT_TAIL {
                    self.events.pop_front();
                }
                self.events.push_back(entry.clone());
            }
            GatewayUpdate::LinkChanged(state) => self.link = *state,
        }
    }
}
