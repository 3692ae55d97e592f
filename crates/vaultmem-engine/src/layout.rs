//! On-disk layout (spec §6):
//!
//! ```text
//! <data_dir>/
//!   store.json
//!   main/
//!     wal.log
//!     segments/NNNNNNNN.seg
//!     indexes/latest.idx
//!     indexes/vector.idx
//!     indexes/text.idx
//!     indexes/merkle.idx
//!   forks/<fork_id>/
//!     wal.log, segments/, indexes/, fork.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vaultmem_core::constants::MAIN_STORE_ID;
use vaultmem_core::errors::VaultResult;

/// Global metadata persisted at `<data_dir>/store.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreManifest {
    pub version: u32,
    pub created: i64,
    pub forks: Vec<ForkSummary>,
    pub snapshots: Vec<SnapshotRecord>,
}

/// One row of `store.json`'s `forks[]`, appended when a fork is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkSummary {
    pub fork_id: String,
    pub source_store_id: String,
    pub name: Option<String>,
    pub created_at: i64,
}

/// A lightweight pointer to a point-in-time snapshot, enough to replay a
/// `createForkAtTime` on demand (spec §4.H "Snapshots").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub source_store_id: String,
    pub timestamp: i64,
    pub merkle_root: Option<String>,
    pub record_count: usize,
    pub created_at: i64,
}

/// Per-fork metadata at `forks/<fork_id>/fork.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkMetadata {
    pub fork_id: String,
    pub name: Option<String>,
    pub note: Option<String>,
    pub source_store_id: String,
    pub created_at: i64,
    pub source_merkle_root: Option<String>,
    pub source_record_count: usize,
    /// Present only for PITR forks (`createForkAtTime`).
    pub pitr_timestamp: Option<i64>,
}

impl StoreManifest {
    pub fn load_or_default(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            return Ok(StoreManifest::default());
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> VaultResult<()> {
        let bytes = serde_json::to_vec_pretty(self).expect("manifest serializes");
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// Path helpers rooted at a single `data_dir`.
#[derive(Debug, Clone)]
pub struct Layout {
    data_dir: PathBuf,
}

impl Layout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Layout { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// The instance directory for `store_id`: `main/` for the primary store,
    /// `forks/<store_id>/` otherwise.
    pub fn instance_dir(&self, store_id: &str) -> PathBuf {
        if store_id == MAIN_STORE_ID {
            self.data_dir.join(MAIN_STORE_ID)
        } else {
            self.data_dir.join("forks").join(store_id)
        }
    }

    pub fn wal_path(&self, store_id: &str) -> PathBuf {
        self.instance_dir(store_id).join("wal.log")
    }

    pub fn segments_dir(&self, store_id: &str) -> PathBuf {
        self.instance_dir(store_id).join("segments")
    }

    pub fn indexes_dir(&self, store_id: &str) -> PathBuf {
        self.instance_dir(store_id).join("indexes")
    }

    pub fn latest_index_path(&self, store_id: &str) -> PathBuf {
        self.indexes_dir(store_id).join("latest.idx")
    }

    pub fn vector_index_path(&self, store_id: &str) -> PathBuf {
        self.indexes_dir(store_id).join("vector.idx")
    }

    pub fn text_index_path(&self, store_id: &str) -> PathBuf {
        self.indexes_dir(store_id).join("text.idx")
    }

    pub fn merkle_index_path(&self, store_id: &str) -> PathBuf {
        self.indexes_dir(store_id).join("merkle.idx")
    }

    pub fn fork_metadata_path(&self, fork_id: &str) -> PathBuf {
        self.instance_dir(fork_id).join("fork.json")
    }

    pub fn ensure_instance_dirs(&self, store_id: &str) -> VaultResult<()> {
        fs::create_dir_all(self.instance_dir(store_id))?;
        fs::create_dir_all(self.segments_dir(store_id))?;
        fs::create_dir_all(self.indexes_dir(store_id))?;
        Ok(())
    }
}
