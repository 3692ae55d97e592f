//! Immutable segments and the [`SegmentManager`] that indexes them (spec §4.C).
//!
//! A segment is the WAL's frame format carried over verbatim after rotation;
//! the reader accepts both `MWAL` and `MSEG` magics so a renamed WAL file
//! loads without rewriting.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use vaultmem_core::constants::{SEGMENT_MAGIC, WAL_FORMAT_VERSION, WAL_MAGIC};
use vaultmem_core::errors::StorageError;
use vaultmem_core::record::Record;

use crate::framing::deserialize_record;

const HEADER_FIXED_LEN: u64 = 16;

/// One immutable, read-only segment file (`NNNNNNNN.seg`).
pub struct Segment {
    pub segment_number: u32,
    path: PathBuf,
    store_id: String,
    body_offset: u64,
    body: Vec<u8>,
    digest_len: usize,
}

impl Segment {
    /// Open and fully validate a segment file: check magic/version, cache the
    /// store id and the record body bytes for random reads.
    pub fn open(path: &Path, expected_store_id: &str, digest_len: usize) -> Result<Self, StorageError> {
        let segment_number = parse_segment_number(path)?;
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if magic != *WAL_MAGIC && magic != *SEGMENT_MAGIC {
            return Err(StorageError::BadMagic {
                expected: vec![*WAL_MAGIC, *SEGMENT_MAGIC],
                found: magic,
            });
        }
        let version = file.read_u32::<LittleEndian>()?;
        if version != WAL_FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion { version });
        }
        let store_id_len = file.read_u32::<LittleEndian>()? as usize;
        let _record_count = file.read_u32::<LittleEndian>()?;
        let mut store_id_bytes = vec![0u8; store_id_len];
        file.read_exact(&mut store_id_bytes)?;
        let store_id = String::from_utf8(store_id_bytes).map_err(|e| StorageError::RecordCorrupt {
            detail: format!("store_id is not valid utf-8: {e}"),
        })?;
        if store_id != expected_store_id {
            return Err(StorageError::StoreIdMismatch {
                expected: expected_store_id.to_string(),
                found: store_id,
            });
        }

        let body_offset = HEADER_FIXED_LEN + store_id_len as u64;
        file.seek(SeekFrom::Start(body_offset))?;
        let mut body = Vec::new();
        file.read_to_end(&mut body)?;

        Ok(Segment {
            segment_number,
            path: path.to_path_buf(),
            store_id,
            body_offset,
            body,
            digest_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Read the record at file-relative `offset` (as stored in a [`vaultmem_core::record::Location`]).
    pub fn read_at(&self, offset: u64) -> Result<Record, StorageError> {
        let rel = offset
            .checked_sub(self.body_offset)
            .ok_or_else(|| StorageError::RecordCorrupt {
                detail: format!("offset {offset} predates segment body start {}", self.body_offset),
            })? as usize;
        let (record, _consumed) = deserialize_record(&self.body, rel, self.digest_len)?;
        Ok(record)
    }

    /// Iterate every record in this segment in on-disk order, yielding
    /// `(record, absolute_offset)`.
    pub fn iterate(&self) -> Result<Vec<(Record, u64)>, StorageError> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        while offset < self.body.len() {
            let (record, consumed) = deserialize_record(&self.body, offset, self.digest_len)?;
            out.push((record, self.body_offset + offset as u64));
            offset += consumed;
        }
        Ok(out)
    }
}

fn parse_segment_number(path: &Path) -> Result<u32, StorageError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| StorageError::RecordCorrupt {
            detail: format!("segment path {} has no file stem", path.display()),
        })?;
    stem.parse::<u32>().map_err(|_| StorageError::RecordCorrupt {
        detail: format!("segment filename {stem} is not a zero-padded number"),
    })
}

/// Owns every segment in a store's `segments/` directory, keyed by segment
/// number, and hands out the next segment path on rotation.
pub struct SegmentManager {
    dir: PathBuf,
    store_id: String,
    digest_len: usize,
    segments: Vec<Segment>,
}

impl SegmentManager {
    /// Scan `dir` for `NNNNNNNN.seg` files, opening and validating each.
    pub fn open(dir: &Path, store_id: &str, digest_len: usize) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("seg"))
            .collect();
        paths.sort();

        let mut segments = Vec::with_capacity(paths.len());
        for path in paths {
            segments.push(Segment::open(&path, store_id, digest_len)?);
        }
        segments.sort_by_key(|s| s.segment_number);

        Ok(SegmentManager {
            dir: dir.to_path_buf(),
            store_id: store_id.to_string(),
            digest_len,
            segments,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The next zero-padded 8-digit segment path, e.g. `00000001.seg`.
    pub fn next_segment_path(&self) -> PathBuf {
        let next = self.segments.iter().map(|s| s.segment_number).max().unwrap_or(0) + 1;
        self.dir.join(format!("{:08}.seg", next))
    }

    /// Open and register a newly rotated segment at `path`.
    pub fn register(&mut self, path: &Path) -> Result<u32, StorageError> {
        let segment = Segment::open(path, &self.store_id, self.digest_len)?;
        let number = segment.segment_number;
        self.segments.push(segment);
        self.segments.sort_by_key(|s| s.segment_number);
        Ok(number)
    }

    pub fn segment(&self, segment_number: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.segment_number == segment_number)
    }

    pub fn read_at(&self, segment_number: u32, offset: u64) -> Result<Record, StorageError> {
        self.segment(segment_number)
            .ok_or_else(|| StorageError::RecordCorrupt {
                detail: format!("no such segment {segment_number}"),
            })?
            .read_at(offset)
    }

    /// Iterate every record across every segment in segment-number order,
    /// then by in-file offset (spec ORDER-3).
    pub fn iterate_all(&self) -> Result<Vec<(Record, u32, u64)>, StorageError> {
        let mut out = Vec::new();
        for segment in &self.segments {
            for (record, offset) in segment.iterate()? {
                out.push((record, segment.segment_number, offset));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::Wal;
    use tempfile::tempdir;
    use vaultmem_core::record::{HashAlgorithm, Memory};

    fn sample_memory(id: &str) -> Record {
        Record::Memory(Memory::new_v1(
            id.into(), "main".into(), 1000, "c".into(), "t".into(), "hi".into(),
            vec![], 5, None, None, None, None, HashAlgorithm::Sha256,
        ))
    }

    #[test]
    fn manager_discovers_segments_in_order() {
        let dir = tempdir().unwrap();
        let segments_dir = dir.path().join("segments");
        fs::create_dir_all(&segments_dir).unwrap();

        let wal_path = dir.path().join("wal.log");
        let mut wal = Wal::open(&wal_path, "main", 32, true, 1024, 0).unwrap();
        wal.append(&sample_memory("m1")).unwrap();
        let seg1 = segments_dir.join("00000001.seg");
        wal.rotate(&seg1).unwrap();
        wal.append(&sample_memory("m2")).unwrap();
        let seg2 = segments_dir.join("00000002.seg");
        wal.rotate(&seg2).unwrap();

        let manager = SegmentManager::open(&segments_dir, "main", 32).unwrap();
        assert_eq!(manager.segment_count(), 2);
        let all = manager.iterate_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0.id(), "m1");
        assert_eq!(all[1].0.id(), "m2");
    }

    #[test]
    fn next_segment_path_is_zero_padded() {
        let dir = tempdir().unwrap();
        let segments_dir = dir.path().join("segments");
        let manager = SegmentManager::open(&segments_dir, "main", 32).unwrap();
        assert_eq!(manager.next_segment_path(), segments_dir.join("00000001.seg"));
    }
}
