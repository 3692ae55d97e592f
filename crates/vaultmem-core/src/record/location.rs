use serde::{Deserialize, Serialize};

/// Where a record's current version physically lives: still in the WAL's
/// active tail, or already rotated into an immutable segment (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Location {
    Wal { offset: u64 },
    Segment { segment_number: u32, offset: u64 },
}

impl Location {
    pub fn offset(self) -> u64 {
        match self {
            Location::Wal { offset } => offset,
            Location::Segment { offset, .. } => offset,
        }
    }

    pub fn is_wal(self) -> bool {
        matches!(self, Location::Wal { .. })
    }

    pub fn segment_number(self) -> Option<u32> {
        match self {
            Location::Wal { .. } => None,
            Location::Segment { segment_number, .. } => Some(segment_number),
        }
    }
}
