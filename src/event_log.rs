//! Bounded audit log of protocol events.
//!
//! Fixed capacity, FIFO eviction: appending to a full log silently drops
//! the oldest entry.  Every entry gets a sequence number at append time;
//! sequence numbers never repeat and define the log's order.
//!
//! The ring is allocated on the heap once, at full capacity, so the log is
//! pointer-sized wherever it is moved and never reallocates.

use std::collections::VecDeque;

use serde::Serialize;

use crate::protocol::{Direction, Event};

/// One appended event and its arrival position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub event: Event,
}

impl LogEntry {
    /// Client-facing rendering.
    pub fn view(&self) -> LogEntryView {
        LogEntryView {
            seq: self.seq,
            topic: self.event.direction(),
            message: self.event.to_string(),
            at: self.event.at(),
        }
    }
}

/// `{seq, topic, message, at}` as served by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntryView {
    pub seq: u64,
    pub topic: Direction,
    pub message: String,
    pub at: u64,
}

/// Append-only ring of the last `N` events.
pub struct EventLog<const N: usize> {
    entries: VecDeque<LogEntry>,
    next_seq: u64,
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventLog<N> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(N),
            next_seq: 1,
        }
    }

    /// Append an event, returning its sequence number.
    pub fn append(&mut self, event: Event) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.entries.len() == N {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry { seq, event });
        seq
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The newest entry.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.len().saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Sequence number of the newest entry, `None` when nothing was appended.
    pub fn last_seq(&self) -> Option<u64> {
        self.next_seq.checked_sub(1).filter(|s| *s > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::CommandKind;

    fn issued(at: u64) -> Event {
        Event::CommandIssued {
            kind: CommandKind::Calibrate,
            bin: None,
            at,
        }
    }

    #[test]
    fn empty_log() {
        let log: EventLog<4> = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 4);
        assert_eq!(log.last_seq(), None);
        assert!(log.tail(10).is_empty());
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut log: EventLog<4> = EventLog::new();
        assert_eq!(log.append(issued(10)), 1);
        assert_eq!(log.append(issued(5)), 2);
        assert_eq!(log.last_seq(), Some(2));
        assert_eq!(log.latest().map(|e| e.seq), Some(2));
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut log: EventLog<3> = EventLog::new();
        for at in 0..4 {
            log.append(issued(at));
        }
        assert_eq!(log.len(), 3);
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
    }

    #[test]
    fn tail_returns_newest_oldest_first() {
        let mut log: EventLog<8> = EventLog::new();
        for at in 0..5 {
            log.append(issued(at));
        }
        let tail: Vec<u64> = log.tail(2).iter().map(|e| e.seq).collect();
        assert_eq!(tail, vec![4, 5]);
        assert_eq!(log.tail(100).len(), 5);
    }

    #[test]
    fn full_size_log_stays_off_the_stack() {
        let mut log: EventLog<500> = EventLog::new();
        assert!(core::mem::size_of_val(&log) <= 64);
        for at in 0..600 {
            log.append(issued(at));
        }
        assert_eq!(log.len(), 500);
        assert_eq!(log.iter().next().map(|e| e.seq), Some(101));
    }

    #[test]
    fn view_uses_arrows_and_dashboard_text() {
        let mut log: EventLog<2> = EventLog::new();
        log.append(issued(7));
        let view = log.iter().next().unwrap().view();
        assert_eq!(view.topic, Direction::Outbound);
        assert_eq!(view.message, "Calibrating");
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(
            json,
            r#"{"seq":1,"topic":"<<<","message":"Calibrating","at":7}"#
        );
    }
}
