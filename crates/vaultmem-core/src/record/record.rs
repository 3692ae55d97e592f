use serde::{Deserialize, Serialize};

use super::{Memory, Relationship};

/// Discriminant stored in the record frame header (spec §4.A) — `0` for a
/// memory, `1` for a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordKind {
    Memory = 0,
    Relationship = 1,
}

impl RecordKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordKind::Memory),
            1 => Some(RecordKind::Relationship),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A tagged union over the two record kinds vaultmem persists. Kept as an
/// enum rather than a trait-object hierarchy so the WAL/segment/index layers
/// can dispatch on the tag directly (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Memory(Memory),
    Relationship(Relationship),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Memory(_) => RecordKind::Memory,
            Record::Relationship(_) => RecordKind::Relationship,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Memory(m) => &m.memory_id,
            Record::Relationship(r) => &r.relationship_id,
        }
    }

    pub fn store_id(&self) -> &str {
        match self {
            Record::Memory(m) => &m.store_id,
            Record::Relationship(r) => &r.store_id,
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Record::Memory(m) => m.version,
            Record::Relationship(r) => r.version,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Record::Memory(m) => m.timestamp,
            Record::Relationship(r) => r.timestamp,
        }
    }

    pub fn deleted(&self) -> bool {
        match self {
            Record::Memory(m) => m.deleted,
            Record::Relationship(r) => r.deleted,
        }
    }

    pub fn content_hash(&self) -> &str {
        match self {
            Record::Memory(m) => &m.content_hash,
            Record::Relationship(r) => &r.content_hash,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Record::Memory(m) => m.embedding.as_deref(),
            Record::Relationship(_) => None,
        }
    }

    pub fn as_memory(&self) -> Option<&Memory> {
        match self {
            Record::Memory(m) => Some(m),
            Record::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Record::Relationship(r) => Some(r),
            Record::Memory(_) => None,
        }
    }
}
