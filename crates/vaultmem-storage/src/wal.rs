//! Write-ahead log (spec §4.B): the durability boundary for not-yet-rotated
//! records. One file per store/fork.
//!
//! ```text
//! magic "MWAL" (4)  version u32 (4)  store_id_len u32 (4)  record_count u32 (4)
//! store_id utf-8 (store_id_len bytes)
//! ```
//! followed by a sequence of record frames (see [`crate::framing`]).

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use vaultmem_core::constants::{SEGMENT_MAGIC, WAL_FORMAT_VERSION, WAL_MAGIC};
use vaultmem_core::errors::StorageError;
use vaultmem_core::record::Record;

use crate::framing::{deserialize_record, serialize_record};

const HEADER_FIXED_LEN: u64 = 16;

/// One live record in the WAL tail, as returned by [`Wal::get_records`].
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub offset: u64,
    pub length: u64,
    pub record: Record,
}

/// An open write-ahead log file.
pub struct Wal {
    path: PathBuf,
    store_id: String,
    file: File,
    record_count: u32,
    digest_len: usize,
    sync_on_write: bool,
    segment_size_bytes: u64,
    wal_max_age_ms: u64,
    oldest_record_timestamp_ms: Option<i64>,
}

impl Wal {
    /// Create a fresh WAL file with an empty header.
    fn create_new(
        path: &Path,
        store_id: &str,
        digest_len: usize,
        sync_on_write: bool,
        segment_size_bytes: u64,
        wal_max_age_ms: u64,
    ) -> Result<Self, StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        write_header(&mut file, WAL_MAGIC, store_id, 0)?;
        file.flush()?;
        if sync_on_write {
            file.sync_all()?;
        }
        Ok(Wal {
            path: path.to_path_buf(),
            store_id: store_id.to_string(),
            file,
            record_count: 0,
            digest_len,
            sync_on_write,
            segment_size_bytes,
            wal_max_age_ms,
            oldest_record_timestamp_ms: None,
        })
    }

    /// Open or create the WAL at `path`. Verifies magic/version and that the
    /// stored `store_id` matches; performs dirty-shutdown truncation recovery
    /// by scanning forward and stopping at the first corrupt/truncated
    /// frame.
    pub fn open(
        path: &Path,
        store_id: &str,
        digest_len: usize,
        sync_on_write: bool,
        segment_size_bytes: u64,
        wal_max_age_ms: u64,
    ) -> Result<Self, StorageError> {
        if !path.exists() {
            return Self::create_new(
                path,
                store_id,
                digest_len,
                sync_on_write,
                segment_size_bytes,
                wal_max_age_ms,
            );
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let (magic, _version, header_store_id, declared_count) = read_header(&mut file)?;
        if magic != *WAL_MAGIC && magic != *SEGMENT_MAGIC {
            return Err(StorageError::BadMagic {
                expected: vec![*WAL_MAGIC, *SEGMENT_MAGIC],
                found: magic,
            });
        }
        if header_store_id != store_id {
            return Err(StorageError::StoreIdMismatch {
                expected: store_id.to_string(),
                found: header_store_id,
            });
        }

        let mut buf = Vec::new();
        file.seek(SeekFrom::Start(body_offset(store_id)))?;
        file.read_to_end(&mut buf)?;

        let mut offset = 0usize;
        let mut good_count = 0u32;
        let mut oldest_ts: Option<i64> = None;
        loop {
            if offset >= buf.len() {
                break;
            }
            match deserialize_record(&buf, offset, digest_len) {
                Ok((record, consumed)) => {
                    oldest_ts = Some(match oldest_ts {
                        Some(existing) => existing.min(record.timestamp()),
                        None => record.timestamp(),
                    });
                    offset += consumed;
                    good_count += 1;
                }
                Err(_) => {
                    warn!(
                        path = %path.display(),
                        good_count,
                        declared_count,
                        "WAL tail truncated or corrupt, rewriting at last good boundary"
                    );
                    break;
                }
            }
        }

        if good_count != declared_count || offset != buf.len() {
            let truncate_at = body_offset(store_id) + offset as u64;
            file.set_len(truncate_at)?;
            rewrite_record_count(&mut file, store_id, good_count)?;
            file.flush()?;
        }

        Ok(Wal {
            path: path.to_path_buf(),
            store_id: store_id.to_string(),
            file,
            record_count: good_count,
            digest_len,
            sync_on_write,
            segment_size_bytes,
            wal_max_age_ms,
            oldest_record_timestamp_ms: oldest_ts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Serialize `record`, append it to the WAL, and update the header's
    /// `record_count`. Returns `(offset, length)` of the new frame within the
    /// file (offset is relative to the start of the file, header included).
    pub fn append(&mut self, record: &Record) -> Result<(u64, u64), StorageError> {
        let frame = serialize_record(record, self.digest_len)?;
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&frame)?;
        self.record_count += 1;
        rewrite_record_count(&mut self.file, &self.store_id, self.record_count)?;
        self.file.flush()?;
        if self.sync_on_write {
            self.file.sync_all()?;
        }
        self.oldest_record_timestamp_ms = Some(match self.oldest_record_timestamp_ms {
            Some(existing) => existing.min(record.timestamp()),
            None => record.timestamp(),
        });
        Ok((offset, frame.len() as u64))
    }

    /// True when the WAL has grown past `segment_size_bytes`, or its oldest
    /// record has aged past `wal_max_age_ms` (spec §4.B).
    pub fn should_rotate(&self, now_ms: i64) -> Result<bool, StorageError> {
        let len = self.file.metadata()?.len();
        if len >= self.segment_size_bytes {
            return Ok(true);
        }
        if self.wal_max_age_ms > 0 {
            if let Some(oldest) = self.oldest_record_timestamp_ms {
                let age = now_ms.saturating_sub(oldest);
                if age as u64 >= self.wal_max_age_ms {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Rename this WAL file to `segment_path` (an atomic POSIX rename) and
    /// recreate a fresh, empty WAL in its place. Returns the records that
    /// were moved so the caller can re-point the latest index.
    pub fn rotate(&mut self, segment_path: &Path) -> Result<Vec<WalEntry>, StorageError> {
        let moved = self.get_records()?;
        self.file.flush()?;
        self.file.sync_all()?;
        fs::rename(&self.path, segment_path)?;

        let fresh = Self::create_new(
            &self.path,
            &self.store_id,
            self.digest_len,
            self.sync_on_write,
            self.segment_size_bytes,
            self.wal_max_age_ms,
        )?;
        *self = fresh;
        Ok(moved)
    }

    /// Enumerate the records currently live in this WAL's tail.
    pub fn get_records(&mut self) -> Result<Vec<WalEntry>, StorageError> {
        let body_start = body_offset(&self.store_id);
        self.file.seek(SeekFrom::Start(body_start))?;
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;

        let mut out = Vec::with_capacity(self.record_count as usize);
        let mut offset = 0usize;
        while offset < buf.len() {
            let (record, consumed) = deserialize_record(&buf, offset, self.digest_len)?;
            out.push(WalEntry {
                offset: body_start + offset as u64,
                length: consumed as u64,
                record,
            });
            offset += consumed;
        }
        Ok(out)
    }
}

fn body_offset(store_id: &str) -> u64 {
    HEADER_FIXED_LEN + store_id.len() as u64
}

fn write_header(file: &mut File, magic: &[u8; 4], store_id: &str, record_count: u32) -> Result<(), StorageError> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(magic)?;
    file.write_u32::<LittleEndian>(WAL_FORMAT_VERSION)?;
    file.write_u32::<LittleEndian>(store_id.len() as u32)?;
    file.write_u32::<LittleEndian>(record_count)?;
    file.write_all(store_id.as_bytes())?;
    Ok(())
}

/// Rewrite just the 4-byte `record_count` field (bytes 12..16), leaving the
/// rest of the header and the body untouched.
fn rewrite_record_count(file: &mut File, _store_id: &str, record_count: u32) -> Result<(), StorageError> {
    let pos = file.stream_position()?;
    file.seek(SeekFrom::Start(12))?;
    file.write_u32::<LittleEndian>(record_count)?;
    file.seek(SeekFrom::Start(pos))?;
    Ok(())
}

/// Read and validate the fixed header, returning `(magic, version, store_id, record_count)`.
fn read_header(file: &mut File) -> Result<([u8; 4], u32, String, u32), StorageError> {
    file.seek(SeekFrom::Start(0))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    let version = file.read_u32::<LittleEndian>()?;
    if version != WAL_FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion { version });
    }
    let store_id_len = file.read_u32::<LittleEndian>()? as usize;
    let record_count = file.read_u32::<LittleEndian>()?;
    let mut store_id_bytes = vec![0u8; store_id_len];
    file.read_exact(&mut store_id_bytes)?;
    let store_id = String::from_utf8(store_id_bytes).map_err(|e| StorageError::RecordCorrupt {
        detail: format!("store_id is not valid utf-8: {e}"),
    })?;
    Ok((magic, version, store_id, record_count))
}
