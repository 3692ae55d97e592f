//! LatestIndex (spec §4.D): one entry per logical id, pointing at the
//! location of its most recent version.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use vaultmem_core::constants::INDEX_SNAPSHOT_VERSION;
use vaultmem_core::errors::StorageError;
use vaultmem_core::record::{Location, Record};

/// One entry in the latest-version index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestEntry {
    pub location: Location,
    pub version: u32,
    pub timestamp: i64,
    pub deleted: bool,
    pub content_hash: String,
}

/// Which logical record kind an id belongs to, mirroring [`vaultmem_core::record::RecordKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Memory,
    Relationship,
}

/// `id -> latest entry`, kept separately per record kind (spec §4.D).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LatestIndex {
    memories: HashMap<String, LatestEntry>,
    relationships: HashMap<String, LatestEntry>,
    #[serde(skip)]
    dirty: bool,
}

impl LatestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: IndexKind) -> &HashMap<String, LatestEntry> {
        match kind {
            IndexKind::Memory => &self.memories,
            IndexKind::Relationship => &self.relationships,
        }
    }

    fn map_mut(&mut self, kind: IndexKind) -> &mut HashMap<String, LatestEntry> {
        match kind {
            IndexKind::Memory => &mut self.memories,
            IndexKind::Relationship => &mut self.relationships,
        }
    }

    /// Update the entry for `id`, only if `entry.version >= existing.version`
    /// (equal-version updates are accepted so WAL→segment re-pointing during
    /// rotation can proceed).
    pub fn update(&mut self, kind: IndexKind, id: &str, entry: LatestEntry) {
        let should_update = match self.map(kind).get(id) {
            Some(existing) => entry.version >= existing.version,
            None => true,
        };
        if should_update {
            self.map_mut(kind).insert(id.to_string(), entry);
            self.dirty = true;
        }
    }

    /// Convenience wrapper around [`Self::update`] for a freshly appended
    /// [`Record`] at `location`.
    pub fn update_from_record(&mut self, record: &Record, location: Location) {
        let kind = match record {
            Record::Memory(_) => IndexKind::Memory,
            Record::Relationship(_) => IndexKind::Relationship,
        };
        self.update(
            kind,
            record.id(),
            LatestEntry {
                location,
                version: record.version(),
                timestamp: record.timestamp(),
                deleted: record.deleted(),
                content_hash: record.content_hash().to_string(),
            },
        );
    }

    pub fn get(&self, kind: IndexKind, id: &str) -> Option<&LatestEntry> {
        self.map(kind).get(id)
    }

    pub fn has(&self, kind: IndexKind, id: &str) -> bool {
        self.map(kind).contains_key(id)
    }

    pub fn iterate(&self, kind: IndexKind, include_deleted: bool) -> Vec<(&str, &LatestEntry)> {
        let mut out: Vec<(&str, &LatestEntry)> = self
            .map(kind)
            .iter()
            .filter(|(_, e)| include_deleted || !e.deleted)
            .map(|(id, e)| (id.as_str(), e))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn count(&self, kind: IndexKind, include_deleted: bool) -> usize {
        if include_deleted {
            self.map(kind).len()
        } else {
            self.map(kind).values().filter(|e| !e.deleted).count()
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn clear(&mut self) {
        self.memories.clear();
        self.relationships.clear();
        self.dirty = true;
    }

    /// Persist a versioned snapshot to `path` (spec §6 `indexes/latest.idx`).
    pub fn save(&mut self, path: &Path) -> Result<(), StorageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&INDEX_SNAPSHOT_VERSION.to_le_bytes())?;
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| StorageError::RecordCorrupt { detail: e.to_string() })?;
        writer.flush()?;
        self.dirty = false;
        Ok(())
    }

    /// Load a snapshot written by [`Self::save`].
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut version_bytes = [0u8; 4];
        reader.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != INDEX_SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion { version });
        }
        let index: LatestIndex = serde_json::from_reader(reader)
            .map_err(|e| StorageError::RecordCorrupt { detail: e.to_string() })?;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(version: u32) -> LatestEntry {
        LatestEntry {
            location: Location::Wal { offset: 0 },
            version,
            timestamp: 1000,
            deleted: false,
            content_hash: "abcd".into(),
        }
    }

    #[test]
    fn newer_version_replaces_older() {
        let mut idx = LatestIndex::new();
        idx.update(IndexKind::Memory, "m1", entry(1));
        idx.update(IndexKind::Memory, "m1", entry(2));
        assert_eq!(idx.get(IndexKind::Memory, "m1").unwrap().version, 2);
    }

    #[test]
    fn older_version_is_rejected() {
        let mut idx = LatestIndex::new();
        idx.update(IndexKind::Memory, "m1", entry(3));
        idx.update(IndexKind::Memory, "m1", entry(1));
        assert_eq!(idx.get(IndexKind::Memory, "m1").unwrap().version, 3);
    }

    #[test]
    fn equal_version_update_is_accepted() {
        let mut idx = LatestIndex::new();
        let mut e1 = entry(2);
        e1.location = Location::Wal { offset: 0 };
        idx.update(IndexKind::Memory, "m1", e1);
        let mut e2 = entry(2);
        e2.location = Location::Segment { segment_number: 1, offset: 16 };
        idx.update(IndexKind::Memory, "m1", e2.clone());
        assert_eq!(idx.get(IndexKind::Memory, "m1").unwrap().location, e2.location);
    }

    #[test]
    fn count_respects_include_deleted() {
        let mut idx = LatestIndex::new();
        idx.update(IndexKind::Memory, "m1", entry(1));
        let mut deleted = entry(2);
        deleted.deleted = true;
        idx.update(IndexKind::Memory, "m2", deleted);
        assert_eq!(idx.count(IndexKind::Memory, false), 1);
        assert_eq!(idx.count(IndexKind::Memory, true), 2);
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest.idx");
        let mut idx = LatestIndex::new();
        idx.update(IndexKind::Memory, "m1", entry(1));
        idx.save(&path).unwrap();
        assert!(!idx.is_dirty());

        let loaded = LatestIndex::load(&path).unwrap();
        assert_eq!(loaded.get(IndexKind::Memory, "m1").unwrap().version, 1);
    }
}
