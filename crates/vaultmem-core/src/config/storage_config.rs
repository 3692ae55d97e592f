use serde::{Deserialize, Serialize};

use super::defaults;
use crate::errors::VaultError;

/// Storage subsystem configuration: data directory layout, segment rotation,
/// and WAL persistence cadence (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding `store.json`, `main/`, and `forks/`.
    pub data_dir: String,
    /// Rotate the active WAL into a segment once it reaches this size.
    pub segment_size_bytes: u64,
    /// Fsync the WAL every N writes. `0` fsyncs on every write.
    pub persist_every_n_writes: u32,
    /// Rotate the active WAL once it has been open this long, regardless of
    /// size. `0` disables age-based rotation.
    pub wal_max_age_ms: u64,
    /// Soft cap on in-memory index size before a rebuild from segments is
    /// recommended; clamped to `[128 MiB, 4 GiB]`.
    pub memory_budget_bytes: u64,
    /// fsync the WAL file on every append (spec §6 `wal_sync_on_write`).
    pub wal_sync_on_write: bool,
    /// Hint that readers may run concurrently with the writer (spec §6
    /// `enable_concurrent_access`); the engine always guards per-store state
    /// with a reader/writer lock, so this only controls whether callers are
    /// encouraged to share a store across threads.
    pub enable_concurrent_access: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::DEFAULT_DATA_DIR.to_string(),
            segment_size_bytes: defaults::DEFAULT_SEGMENT_SIZE_BYTES,
            persist_every_n_writes: defaults::DEFAULT_PERSIST_EVERY_N_WRITES,
            wal_max_age_ms: defaults::DEFAULT_WAL_MAX_AGE_MS,
            memory_budget_bytes: defaults::DEFAULT_MEMORY_BUDGET_BYTES,
            wal_sync_on_write: true,
            enable_concurrent_access: true,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.data_dir.trim().is_empty() {
            return Err(VaultError::ConfigInvalid("data_dir must not be empty".into()));
        }
        if self.segment_size_bytes < defaults::MIN_SEGMENT_SIZE_BYTES {
            return Err(VaultError::ConfigInvalid(format!(
                "segment_size_bytes must be >= {} bytes",
                defaults::MIN_SEGMENT_SIZE_BYTES
            )));
        }
        if self.memory_budget_bytes < defaults::MIN_MEMORY_BUDGET_BYTES
            || self.memory_budget_bytes > defaults::MAX_MEMORY_BUDGET_BYTES
        {
            return Err(VaultError::ConfigInvalid(format!(
                "memory_budget_bytes must be within [{}, {}]",
                defaults::MIN_MEMORY_BUDGET_BYTES,
                defaults::MAX_MEMORY_BUDGET_BYTES
            )));
        }
        Ok(())
    }
}
