//! Bin state store: the authoritative per-bin status table.
//!
//! One [`BinState`] per configured bin, created at startup as `Unknown`.
//! Telemetry is applied only when it is strictly newer than what the
//! store already holds, so a late or duplicated report can never roll a
//! bin back.
//!
//! The store has a single writer (the gateway worker).  Readers get
//! copies via [`BinStateStore::snapshot`].

use log::debug;

use super::{BinId, BinState, BinStatus, Fleet, MAX_FLEET_SIZE};

/// Fixed-size table of bin states indexed by `BinId - 1`.
#[derive(Debug, Clone)]
pub struct BinStateStore {
    fleet: Fleet,
    bins: heapless::Vec<BinState, { MAX_FLEET_SIZE as usize }>,
}

impl BinStateStore {
    pub fn new(fleet: Fleet) -> Self {
        let mut bins = heapless::Vec::new();
        for id in fleet.iter() {
            // Fleet size is clamped to MAX_FLEET_SIZE, so this never overflows.
            let _ = bins.push(BinState::new(id));
        }
        Self { fleet, bins }
    }

    pub fn fleet(&self) -> Fleet {
        self.fleet
    }

    /// Apply a telemetry report taken at `at` (wall-clock ms).
    ///
    /// Returns `false` when the bin is not in the fleet or the report is
    /// not newer than the last applied one.
    pub fn apply_telemetry(&mut self, bin: BinId, status: BinStatus, at: u64) -> bool {
        let Some(state) = self.slot_mut(bin) else {
            return false;
        };
        if let Some(last) = state.last_updated {
            if at <= last {
                debug!("store: stale telemetry for bin {} ({} <= {})", bin, at, last);
                return false;
            }
        }
        state.status = status;
        state.last_updated = Some(at);
        true
    }

    /// Return a bin to `Unknown` (operator action).
    pub fn reset(&mut self, bin: BinId) -> bool {
        match self.slot_mut(bin) {
            Some(state) => {
                *state = BinState::new(bin);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, bin: BinId) -> Option<BinState> {
        if !self.fleet.contains(u32::from(bin.get())) {
            return None;
        }
        self.bins.get(bin.index()).copied()
    }

    /// Point-in-time copy of every bin, ordered by id.
    pub fn snapshot(&self) -> Vec<BinState> {
        self.bins.to_vec()
    }

    fn slot_mut(&mut self, bin: BinId) -> Option<&mut BinState> {
        if !self.fleet.contains(u32::from(bin.get())) {
            return None;
        }
        self.bins.get_mut(bin.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> BinStateStore {
        BinStateStore::new(Fleet::new(5))
    }

    fn bin(raw: u32) -> BinId {
        Fleet::new(MAX_FLEET_SIZE).bin(raw).unwrap()
    }

    #[test]
    fn starts_unknown() {
        let s = store();
        let snap = s.snapshot();
        assert_eq!(snap.len(), 5);
        for (i, b) in snap.iter().enumerate() {
            assert_eq!(b.id.get() as usize, i + 1);
            assert_eq!(b.status, BinStatus::Unknown);
            assert!(b.last_updated.is_none());
        }
    }

    #[test]
    fn applies_fresh_telemetry() {
        let mut s = store();
        assert!(s.apply_telemetry(bin(3), BinStatus::TwoThirds, 1_000));
        let b = s.get(bin(3)).unwrap();
        assert_eq!(b.status, BinStatus::TwoThirds);
        assert_eq!(b.last_updated, Some(1_000));
    }

    #[test]
    fn ignores_equal_or_older_timestamps() {
        let mut s = store();
        assert!(s.apply_telemetry(bin(1), BinStatus::Full, 2_000));
        assert!(!s.apply_telemetry(bin(1), BinStatus::Empty, 2_000));
        assert!(!s.apply_telemetry(bin(1), BinStatus::Empty, 1_999));
        assert_eq!(s.get(bin(1)).unwrap().status, BinStatus::Full);
        assert!(s.apply_telemetry(bin(1), BinStatus::Empty, 2_001));
        assert_eq!(s.get(bin(1)).unwrap().status, BinStatus::Empty);
    }

    #[test]
    fn rejects_bins_outside_fleet() {
        let mut s = store();
        let before = s.snapshot();
        assert!(!s.apply_telemetry(bin(7), BinStatus::Full, 10));
        assert!(s.get(bin(7)).is_none());
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn reset_returns_bin_to_unknown() {
        let mut s = store();
        s.apply_telemetry(bin(2), BinStatus::OneThird, 50);
        assert!(s.reset(bin(2)));
        let b = s.get(bin(2)).unwrap();
        assert_eq!(b.status, BinStatus::Unknown);
        assert!(b.last_updated.is_none());
        // After a reset any timestamp is accepted again.
        assert!(s.apply_telemetry(bin(2), BinStatus::Empty, 10));
        assert!(!s.reset(bin(6)));
    }
}
