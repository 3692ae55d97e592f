//! # vaultmem-engine
//!
//! The store coordinator (spec §4.H): owns a process-local registry of
//! [`StoreInstance`]s keyed by store id (`main`, plus forks), and exposes
//! the write/read/search/fork/recovery operations every other crate's
//! primitives compose into.

pub mod cadence;
pub mod fork;
pub mod instance;
pub mod layout;
pub mod read;
pub mod recovery;
pub mod search;
pub mod write;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use vaultmem_core::config::VaultConfig;
use vaultmem_core::constants::MAIN_STORE_ID;
use vaultmem_core::errors::VaultResult;
use vaultmem_core::record::{HashAlgorithm, Memory, RelationshipType};
use vaultmem_core::traits::Embedder;

pub use instance::StoreInstance;
pub use layout::{ForkMetadata, Layout, SnapshotRecord, StoreManifest};
pub use read::{get_due_memories, get_memory, get_relationship, list_memories, ListMemoriesOptions};
pub use recovery::IntegrityMismatch;
pub use search::{SearchMode, SearchOptions, SearchResult};
pub use write::MemoryInput;

/// Every store instance is guarded independently so concurrent access
/// across distinct stores (e.g. `main` and a fork) is fully parallel; only
/// registry inserts (opening a not-yet-loaded store) take the coarser outer
/// lock, and only briefly (spec §5).
pub struct VaultEngine {
    layout: Layout,
    config: VaultConfig,
    embedder: Option<Box<dyn Embedder>>,
    stores: RwLock<HashMap<String, Arc<RwLock<StoreInstance>>>>,
}

impl VaultEngine {
    /// Open (creating if absent) the store rooted at `data_dir`, eagerly
    /// loading the `main` instance. When `data_dir` is `None`, falls back to
    /// `config.storage.data_dir` (spec §6 `data_dir`) — the caller-supplied
    /// path always wins when both are given.
    pub fn open(
        data_dir: Option<PathBuf>,
        config: VaultConfig,
        embedder: Option<Box<dyn Embedder>>,
    ) -> VaultResult<Self> {
        config.validate()?;
        let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(&config.storage.data_dir));
        let layout = Layout::new(data_dir);
        fs::create_dir_all(layout.data_dir())?;

        let manifest_path = layout.manifest_path();
        if !manifest_path.exists() {
            let manifest = StoreManifest { version: 1, created: now_ms(), forks: Vec::new(), snapshots: Vec::new() };
            manifest.save(&manifest_path)?;
        }

        let engine = VaultEngine { layout, config, embedder, stores: RwLock::new(HashMap::new()) };
        engine.get_or_open(MAIN_STORE_ID)?;
        Ok(engine)
    }

    fn algo(&self) -> VaultResult<HashAlgorithm> {
        self.config.merkle.algorithm()
    }

    fn get_or_open(&self, store_id: &str) -> VaultResult<Arc<RwLock<StoreInstance>>> {
        if let Some(existing) = self.stores.read().get(store_id) {
            return Ok(existing.clone());
        }
        let mut stores = self.stores.write();
        if let Some(existing) = stores.get(store_id) {
            return Ok(existing.clone());
        }
        let instance = StoreInstance::open(&self.layout, store_id, &self.config)?;
        let arc = Arc::new(RwLock::new(instance));
        stores.insert(store_id.to_string(), arc.clone());
        Ok(arc)
    }

    /// Run `f` against `store_id`'s instance, opening it lazily if this is
    /// the first reference to it in this process.
    pub fn with_store<R>(
        &self,
        store_id: &str,
        f: impl FnOnce(&mut StoreInstance) -> VaultResult<R>,
    ) -> VaultResult<R> {
        let arc = self.get_or_open(store_id)?;
        let mut guard = arc.write();
        f(&mut guard)
    }

    /// Persist `store_id`'s dirty indexes (if any) and drop it from the
    /// registry. A later reference reopens it fresh from disk.
    pub fn close(&self, store_id: &str) -> VaultResult<()> {
        let removed = self.stores.write().remove(store_id);
        if let Some(arc) = removed {
            let mut guard = arc.write();
            if guard.is_dirty() {
                guard.persist(&self.layout)?;
            }
        }
        Ok(())
    }

    // --- write path (spec §4.H) -------------------------------------------------

    pub fn add_memory(&self, store_id: &str, memory_id: String, input: MemoryInput) -> VaultResult<Memory> {
        let algo = self.algo()?;
        let embedder = self.embedder.as_deref();
        self.with_store(store_id, |instance| {
            write::add_memory(
                instance,
                &self.layout,
                memory_id,
                store_id.to_string(),
                input,
                embedder,
                now_ms(),
                algo,
            )
        })
    }

    pub fn update_memory(&self, store_id: &str, memory_id: &str, input: MemoryInput) -> VaultResult<Memory> {
        let algo = self.algo()?;
        let embedder = self.embedder.as_deref();
        self.with_store(store_id, |instance| {
            write::update_memory(instance, &self.layout, memory_id, input, embedder, now_ms(), algo)
        })
    }

    pub fn delete_memory(&self, store_id: &str, memory_id: &str) -> VaultResult<Memory> {
        let algo = self.algo()?;
        self.with_store(store_id, |instance| {
            write::delete_memory(instance, &self.layout, memory_id, now_ms(), algo)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_relationship(
        &self,
        store_id: &str,
        relationship_id: String,
        memory_id: String,
        related_memory_id: String,
        relationship_type: RelationshipType,
    ) -> VaultResult<vaultmem_core::record::Relationship> {
        let algo = self.algo()?;
        self.with_store(store_id, |instance| {
            write::add_relationship(
                instance,
                &self.layout,
                relationship_id,
                store_id.to_string(),
                memory_id,
                related_memory_id,
                relationship_type,
                now_ms(),
                algo,
            )
        })
    }

    pub fn remove_relationship(
        &self,
        store_id: &str,
        relationship_id: &str,
    ) -> VaultResult<vaultmem_core::record::Relationship> {
        let algo = self.algo()?;
        self.with_store(store_id, |instance| {
            write::remove_relationship(instance, &self.layout, relationship_id, now_ms(), algo)
        })
    }

    // --- read path ---------------------------------------------------------

    pub fn get_memory(&self, store_id: &str, memory_id: &str) -> VaultResult<Option<Memory>> {
        self.with_store(store_id, |instance| read::get_memory(instance, memory_id))
    }

    pub fn get_relationship(
        &self,
        store_id: &str,
        relationship_id: &str,
    ) -> VaultResult<Option<vaultmem_core::record::Relationship>> {
        self.with_store(store_id, |instance| read::get_relationship(instance, relationship_id))
    }

    pub fn list_memories(&self, store_id: &str, options: &ListMemoriesOptions) -> VaultResult<Vec<Memory>> {
        self.with_store(store_id, |instance| read::list_memories(instance, options))
    }

    pub fn get_due_memories(&self, store_id: &str, as_of: DateTime<Utc>) -> VaultResult<Vec<Memory>> {
        self.with_store(store_id, |instance| read::get_due_memories(instance, as_of))
    }

    // --- search --------------------------------------------------------------

    pub fn search(&self, store_id: &str, options: &SearchOptions) -> VaultResult<Vec<SearchResult>> {
        let embedder = self.embedder.as_deref();
        self.with_store(store_id, |instance| search::search(instance, options, embedder))
    }

    // --- forking / PITR --------------------------------------------------------

    /// `createFork(source_id, { fork_id?, name?, note? })` — a fresh random
    /// id is generated when `fork_id` is omitted (spec §4.H "Forking").
    pub fn create_fork(
        &self,
        source_id: &str,
        fork_id: Option<String>,
        name: Option<String>,
        note: Option<String>,
    ) -> VaultResult<ForkMetadata> {
        let fork_id = fork_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let source_arc = self.get_or_open(source_id)?;
        let (fork_instance, metadata) = {
            let mut source_guard = source_arc.write();
            fork::create_fork(&self.layout, &mut *source_guard, &fork_id, name, note, &self.config, now_ms())?
        };
        self.stores.write().insert(fork_id, Arc::new(RwLock::new(fork_instance)));
        Ok(metadata)
    }

    pub fn create_fork_at_time(
        &self,
        source_id: &str,
        fork_id: Option<String>,
        cutoff_ts: i64,
        name: Option<String>,
        note: Option<String>,
    ) -> VaultResult<ForkMetadata> {
        let fork_id = fork_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let source_arc = self.get_or_open(source_id)?;
        let (fork_instance, metadata) = {
            let mut source_guard = source_arc.write();
            fork::create_fork_at_time(
                &self.layout,
                &mut *source_guard,
                &fork_id,
                cutoff_ts,
                name,
                note,
                &self.config,
                now_ms(),
            )?
        };
        self.stores.write().insert(fork_id, Arc::new(RwLock::new(fork_instance)));
        Ok(metadata)
    }

    pub fn delete_fork(&self, fork_id: &str) -> VaultResult<()> {
        self.stores.write().remove(fork_id);
        fork::delete_fork(&self.layout, fork_id)
    }

    pub fn create_snapshot(&self, source_id: &str, timestamp: i64) -> VaultResult<SnapshotRecord> {
        self.with_store(source_id, |instance| {
            fork::create_snapshot(&self.layout, source_id, instance, timestamp, now_ms())
        })
    }

    /// `restoreSnapshot(snap_id)`: sugar for `createForkAtTime` against the
    /// snapshot's source store and timestamp; `fork_id` is auto-generated
    /// when omitted, same as [`Self::create_fork`].
    pub fn restore_snapshot(
        &self,
        snapshot_id: &str,
        source_id: &str,
        fork_id: Option<String>,
    ) -> VaultResult<ForkMetadata> {
        let fork_id = fork_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let source_arc = self.get_or_open(source_id)?;
        let (fork_instance, metadata) = {
            let mut source_guard = source_arc.write();
            fork::restore_snapshot(&self.layout, &mut *source_guard, snapshot_id, &fork_id, &self.config, now_ms())?
        };
        self.stores.write().insert(fork_id, Arc::new(RwLock::new(fork_instance)));
        Ok(metadata)
    }

    // --- recovery --------------------------------------------------------------

    pub fn verify_integrity(&self, store_id: &str) -> VaultResult<Vec<IntegrityMismatch>> {
        self.with_store(store_id, recovery::verify_integrity)
    }

    pub fn rebuild_indexes(&self, store_id: &str) -> VaultResult<usize> {
        self.with_store(store_id, |instance| recovery::rebuild_indexes(instance, &self.layout))
    }

    pub fn check_recovery_needed(&self, store_id: &str) -> VaultResult<bool> {
        self.with_store(store_id, recovery::check_recovery_needed)
    }

    pub fn recover(&self, store_id: &str) -> VaultResult<bool> {
        self.with_store(store_id, |instance| recovery::recover(instance, &self.layout))
    }

    pub fn compact_wal(&self, store_id: &str) -> VaultResult<(bool, usize)> {
        self.with_store(store_id, |instance| recovery::compact_wal(instance, &self.layout))
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
