//! Fleet domain types: bin identity, fill status and per-bin state.
//!
//! The fleet is the fixed set of bins `1..=fleet_size` configured at
//! startup.  Nothing outside that set is ever created.

pub mod store;

use core::cmp::Ordering;
use core::fmt;

use serde::Serialize;

pub use store::BinStateStore;

/// Largest fleet the command channel can address.
///
/// A Collect is published as the decimal bin id on the same channel where
/// `"0"` means Calibrate and `"9"` means Dock, and echoes are recognised
/// as single digits, so bin ids stop at 8.
pub const MAX_FLEET_SIZE: u8 = 8;

// ---------------------------------------------------------------------------
// BinId
// ---------------------------------------------------------------------------

/// Identifier of a bin in the fleet.  Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BinId(u8);

impl BinId {
    /// Raw numeric id as published on the wire.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based index into per-bin tables.
    pub(crate) const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// The configured set of bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fleet {
    size: u8,
}

impl Fleet {
    /// Build a fleet of `size` bins, clamped to `1..=MAX_FLEET_SIZE`.
    /// Config validation rejects out-of-range sizes before this is reached.
    pub fn new(size: u8) -> Self {
        Self {
            size: size.clamp(1, MAX_FLEET_SIZE),
        }
    }

    pub const fn size(self) -> u8 {
        self.size
    }

    /// Resolve a raw id to a fleet member.
    pub fn bin(self, raw: u32) -> Option<BinId> {
        if raw >= 1 && raw <= u32::from(self.size) {
            Some(BinId(raw as u8))
        } else {
            None
        }
    }

    pub fn contains(self, raw: u32) -> bool {
        self.bin(raw).is_some()
    }

    /// Every bin in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = BinId> {
        (1..=self.size).map(BinId)
    }
}

// ---------------------------------------------------------------------------
// BinStatus
// ---------------------------------------------------------------------------

/// Last reported fill level of a bin.
///
/// Ordered by fill level, except `Unknown` which is incomparable with every
/// reported level and only marks "never reported".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinStatus {
    Unknown,
    Empty,
    OneThird,
    TwoThirds,
    Full,
}

impl BinStatus {
    /// Map a wire level (0–3) to a status.
    pub const fn from_level(level: u32) -> Option<Self> {
        match level {
            0 => Some(Self::Empty),
            1 => Some(Self::OneThird),
            2 => Some(Self::TwoThirds),
            3 => Some(Self::Full),
            _ => None,
        }
    }

    /// Wire level, `None` for `Unknown`.
    pub const fn level(self) -> Option<u8> {
        match self {
            Self::Unknown => None,
            Self::Empty => Some(0),
            Self::OneThird => Some(1),
            Self::TwoThirds => Some(2),
            Self::Full => Some(3),
        }
    }

    /// Dashboard label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Empty => "Empty",
            Self::OneThird => "1/3 Full",
            Self::TwoThirds => "2/3 Full",
            Self::Full => "3/3 Full",
        }
    }
}

impl PartialOrd for BinStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.level(), other.level()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// BinState
// ---------------------------------------------------------------------------

/// Authoritative state of one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinState {
    pub id: BinId,
    pub status: BinStatus,
    /// Wall-clock milliseconds since the Unix epoch of the last applied
    /// telemetry, `None` until the bin first reports.
    pub last_updated: Option<u64>,
}

impl BinState {
    pub const fn new(id: BinId) -> Self {
        Self {
            id,
            status: BinStatus::Unknown,
            last_updated: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_resolves_only_configured_ids() {
        let fleet = Fleet::new(5);
        assert!(fleet.bin(0).is_none());
        assert_eq!(fleet.bin(1).map(BinId::get), Some(1));
        assert_eq!(fleet.bin(5).map(BinId::get), Some(5));
        assert!(fleet.bin(6).is_none());
        assert!(fleet.bin(u32::MAX).is_none());
    }

    #[test]
    fn fleet_size_is_clamped() {
        assert_eq!(Fleet::new(0).size(), 1);
        assert_eq!(Fleet::new(200).size(), MAX_FLEET_SIZE);
    }

    #[test]
    fn fleet_iterates_in_order() {
        let ids: Vec<u8> = Fleet::new(3).iter().map(BinId::get).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn level_mapping_roundtrip() {
        for level in 0..4 {
            let s = BinStatus::from_level(level).unwrap();
            assert_eq!(s.level(), Some(level as u8));
        }
        assert!(BinStatus::from_level(4).is_none());
    }

    #[test]
    fn unknown_is_incomparable() {
        assert!(BinStatus::Empty < BinStatus::Full);
        assert!(BinStatus::TwoThirds > BinStatus::OneThird);
        assert_eq!(BinStatus::Unknown.partial_cmp(&BinStatus::Empty), None);
        assert_eq!(BinStatus::Full.partial_cmp(&BinStatus::Unknown), None);
    }

    #[test]
    fn labels_match_dashboard() {
        assert_eq!(BinStatus::Unknown.label(), "Unknown");
        assert_eq!(BinStatus::TwoThirds.label(), "2/3 Full");
        assert_eq!(BinStatus::Full.label(), "3/3 Full");
    }
}
