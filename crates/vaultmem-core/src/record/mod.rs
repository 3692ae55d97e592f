//! The record model: [`Memory`], [`Relationship`], and the tagged [`Record`]
//! enum that wraps them, plus canonical content hashing (spec §3) and the
//! [`Location`] value used by the latest-version index (spec §4.D).

mod hash;
mod location;
mod memory;
mod record;
mod relationship;

pub use hash::{hex_decode, hex_encode, HashAlgorithm};
pub use location::Location;
pub use memory::{CadenceType, Memory};
pub use record::{Record, RecordKind};
pub use relationship::{Relationship, RelationshipType};

/// Fields every record kind exposes, for code that dispatches on the tag
/// instead of on a type hierarchy (spec §9 "polymorphism over record
/// kinds").
pub trait RecordHeader {
    fn id(&self) -> &str;
    fn version(&self) -> u32;
    fn store_id(&self) -> &str;
    fn timestamp(&self) -> i64;
    fn deleted(&self) -> bool;
    fn content_hash(&self) -> &str;
    fn prev_hash(&self) -> Option<&str>;
}

impl RecordHeader for Memory {
    fn id(&self) -> &str {
        &self.memory_id
    }
    fn version(&self) -> u32 {
        self.version
    }
    fn store_id(&self) -> &str {
        &self.store_id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn deleted(&self) -> bool {
        self.deleted
    }
    fn content_hash(&self) -> &str {
        &self.content_hash
    }
    fn prev_hash(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }
}

impl RecordHeader for Relationship {
    fn id(&self) -> &str {
        &self.relationship_id
    }
    fn version(&self) -> u32 {
        self.version
    }
    fn store_id(&self) -> &str {
        &self.store_id
    }
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
    fn deleted(&self) -> bool {
        self.deleted
    }
    fn content_hash(&self) -> &str {
        &self.content_hash
    }
    fn prev_hash(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }
}
