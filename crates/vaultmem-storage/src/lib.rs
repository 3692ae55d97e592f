//! # vaultmem-storage
//!
//! The durability layer: record framing, the write-ahead log, immutable
//! segments, and the latest-version index (spec §4.A–§4.D).

pub mod framing;
pub mod latest_index;
pub mod segment;
pub mod wal;

pub use framing::{deserialize_record, serialize_record};
pub use latest_index::{IndexKind, LatestEntry, LatestIndex};
pub use segment::{Segment, SegmentManager};
pub use wal::{Wal, WalEntry};
