//! [`StoreInstance`]: the four derived indexes (D/E/F/G) plus the WAL and
//! segment manager for a single store/fork, and the fan-out logic that keeps
//! them in sync with the log (spec §4.H).

use tracing::{debug, info};

use vaultmem_core::config::VaultConfig;
use vaultmem_core::errors::VaultResult;
use vaultmem_core::record::{HashAlgorithm, Location, Record};
use vaultmem_storage::latest_index::IndexKind;
use vaultmem_storage::{LatestIndex, Segment, SegmentManager, Wal};
use vaultmem_merkle::MerkleTree;
use vaultmem_text::{Bm25Params, DocumentMetadata, TextIndex};
use vaultmem_vector::{HnswParams, VectorIndex};

use crate::layout::Layout;

fn index_kind_of(record: &Record) -> IndexKind {
    match record {
        Record::Memory(_) => IndexKind::Memory,
        Record::Relationship(_) => IndexKind::Relationship,
    }
}

fn hnsw_params(config: &VaultConfig) -> HnswParams {
    HnswParams {
        m: config.hnsw.m,
        ef_construction: config.hnsw.ef_construction,
        ef_search: config.hnsw.ef_search,
        dimensions: config.hnsw.dimensions,
    }
}

fn bm25_params(config: &VaultConfig) -> Bm25Params {
    Bm25Params {
        k1: config.text_index.k1,
        b: config.text_index.b,
        min_token_length: config.text_index.min_token_length,
        remove_stop_words: config.text_index.stop_words,
    }
}

/// Deterministic per-store HNSW level-assignment seed (spec §4.F): derived
/// from the store id so the same store always reproduces the same graph
/// shape, and distinct stores/forks don't share a generator state.
fn hnsw_seed(store_id: &str) -> u64 {
    let digest = HashAlgorithm::Sha256.hash(store_id.as_bytes());
    u64::from_le_bytes(digest[0..8].try_into().expect("sha256 digest is >= 8 bytes"))
}

/// Owns one store/fork's durability layer (WAL + segments) and its four
/// derived indexes. Every externally observable operation on a `StoreInstance`
/// is expected to run under the engine's per-store lock (spec §5).
pub struct StoreInstance {
    pub store_id: String,
    pub algo: HashAlgorithm,
    pub wal: Wal,
    pub segments: SegmentManager,
    pub latest: LatestIndex,
    pub merkle: MerkleTree,
    pub vector: VectorIndex,
    pub text: TextIndex,
    hnsw_params: HnswParams,
    hnsw_seed: u64,
    bm25_params: Bm25Params,
    writes_since_persist: u32,
    persist_every_n_writes: u32,
    dirty: bool,
}

impl StoreInstance {
    /// Open (or create) every on-disk piece for `store_id` under `layout`.
    /// Index snapshots are loaded if present; otherwise a fresh empty index
    /// is used (the caller is responsible for invoking recovery if segments
    /// or the WAL already hold records the index doesn't reflect).
    pub fn open(layout: &Layout, store_id: &str, config: &VaultConfig) -> VaultResult<Self> {
        layout.ensure_instance_dirs(store_id)?;
        let algo = config.merkle.algorithm()?;
        let digest_len = algo.digest_len();

        let wal = Wal::open(
            &layout.wal_path(store_id),
            store_id,
            digest_len,
            config.storage.wal_sync_on_write,
            config.storage.segment_size_bytes,
            config.storage.wal_max_age_ms,
        )?;
        let segments = SegmentManager::open(&layout.segments_dir(store_id), store_id, digest_len)?;

        let latest = LatestIndex::load(&layout.latest_index_path(store_id)).unwrap_or_default();
        let merkle =
            MerkleTree::load(&layout.merkle_index_path(store_id)).unwrap_or_else(|_| MerkleTree::new(algo));
        let seed = hnsw_seed(store_id);
        let params = hnsw_params(config);
        let vector = VectorIndex::load(&layout.vector_index_path(store_id), params, seed)
            .unwrap_or_else(|_| VectorIndex::new(params, seed));
        let text_params = bm25_params(config);
        let text = TextIndex::load(&layout.text_index_path(store_id))
            .unwrap_or_else(|_| TextIndex::new(text_params));

        Ok(StoreInstance {
            store_id: store_id.to_string(),
            algo,
            wal,
            segments,
            latest,
            merkle,
            vector,
            text,
            hnsw_params: params,
            hnsw_seed: seed,
            bm25_params: text_params,
            writes_since_persist: 0,
            persist_every_n_writes: config.storage.persist_every_n_writes,
            dirty: false,
        })
    }

    /// Total records ever appended: segments + current WAL tail.
    pub fn total_record_count(&mut self) -> VaultResult<usize> {
        Ok(self.segments.iterate_all()?.len() + self.wal.get_records()?.len())
    }

    /// Append `record` to the WAL (durable) and fan it out to D/E/F/G,
    /// persisting index snapshots on the configured cadence and rotating the
    /// WAL into a new segment if it has grown past threshold (spec §4.H
    /// write path).
    pub fn append_and_fan_out(
        &mut self,
        layout: &Layout,
        record: &Record,
        now_ms: i64,
    ) -> VaultResult<Location> {
        let (offset, _len) = self.wal.append(record)?;
        let location = Location::Wal { offset };
        self.apply_fan_out(record, location);
        self.dirty = true;
        self.writes_since_persist += 1;

        if self.persist_every_n_writes > 0 && self.writes_since_persist >= self.persist_every_n_writes {
            self.persist(layout)?;
        }
        if self.wal.should_rotate(now_ms)? {
            self.rotate()?;
            self.persist(layout)?;
        }
        Ok(location)
    }

    /// Update D/E/F/G for one record at `location`, without touching the
    /// WAL. Shared by the live write path and by [`Self::rebuild`], which
    /// replays the entire log through the same fan-out (spec §9 "indexes are
    /// derived views").
    fn apply_fan_out(&mut self, record: &Record, location: Location) {
        self.latest.update_from_record(record, location);
        self.merkle.add_leaf(record.content_hash().to_string());

        if let Record::Memory(memory) = record {
            if memory.deleted {
                self.vector.remove(&memory.memory_id);
                self.text.remove(&memory.memory_id);
            } else {
                match &memory.embedding {
                    Some(embedding) => {
                        if let Err(err) = self.vector.insert(&memory.memory_id, embedding.clone()) {
                            debug!(memory_id = %memory.memory_id, error = %err, "vector insert failed during fan-out");
                        }
                    }
                    None => self.vector.remove(&memory.memory_id),
                }
                let metadata = DocumentMetadata {
                    category: Some(memory.category.clone()),
                    doc_type: Some(memory.memory_type.clone()),
                    tags: memory.tags.clone(),
                    context: memory.context.clone(),
                };
                self.text.add(&memory.memory_id, &memory.content, Some(&metadata));
            }
        }
    }

    /// Whether the active WAL should be manually persisted and/or rotated
    /// has not been reached yet; exposed for `persist_every_n_writes == 0`
    /// (manual cadence) callers that want to flush explicitly.
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.latest.is_dirty()
    }

    /// Persist every index snapshot (spec §6 `indexes/*.idx`).
    pub fn persist(&mut self, layout: &Layout) -> VaultResult<()> {
        self.latest.save(&layout.latest_index_path(&self.store_id))?;
        self.merkle.save(&layout.merkle_index_path(&self.store_id))?;
        self.vector.save(&layout.vector_index_path(&self.store_id))?;
        self.text.save(&layout.text_index_path(&self.store_id))?;
        self.writes_since_persist = 0;
        self.dirty = false;
        Ok(())
    }

    /// WAL → segment rotation (spec §4.H "Rotation"): rename the WAL file to
    /// the next segment path, register it, and re-point D entries whose
    /// version hasn't since been superseded by a newer WAL write.
    pub fn rotate(&mut self) -> VaultResult<usize> {
        let seg_path = self.segments.next_segment_path();
        let moved = self.wal.rotate(&seg_path)?;
        let segment_number = self.segments.register(&seg_path)?;

        let mut repointed = 0;
        for entry in &moved {
            let kind = index_kind_of(&entry.record);
            let id = entry.record.id();
            let still_current = self
                .latest
                .get(kind, id)
                .map(|e| e.version == entry.record.version())
                .unwrap_or(false);
            if still_current {
                let new_location = Location::Segment { segment_number, offset: entry.offset };
                self.latest.update(
                    kind,
                    id,
                    vaultmem_storage::LatestEntry {
                        location: new_location,
                        version: entry.record.version(),
                        timestamp: entry.record.timestamp(),
                        deleted: entry.record.deleted(),
                        content_hash: entry.record.content_hash().to_string(),
                    },
                );
                repointed += 1;
            }
        }
        info!(store_id = %self.store_id, segment_number, moved = moved.len(), repointed, "rotated WAL into segment");
        Ok(moved.len())
    }

    /// Resolve `id`'s current record via D, reading from the WAL tail or a
    /// segment as appropriate (spec §4.H read path).
    pub fn get_record(&mut self, kind: IndexKind, id: &str) -> VaultResult<Option<Record>> {
        let Some(entry) = self.latest.get(kind, id).cloned() else { return Ok(None) };
        match entry.location {
            Location::Wal { .. } => {
                let records = self.wal.get_records()?;
                Ok(records
                    .into_iter()
                    .find(|e| e.record.id() == id && e.record.version() == entry.version)
                    .map(|e| e.record))
            }
            Location::Segment { segment_number, offset } => {
                Ok(Some(self.segments.read_at(segment_number, offset)?))
            }
        }
    }

    /// Read the raw record bytes live at `offset`, dispatching to the WAL or
    /// a segment depending on where `offset` falls. Used by rebuild/PITR to
    /// enumerate every record (not just the latest per id) in canonical
    /// append order (spec ORDER-1/ORDER-3).
    pub fn iterate_all_records(&mut self) -> VaultResult<Vec<Record>> {
        let mut out = Vec::new();
        for (record, _segment_number, _offset) in self.segments.iterate_all()? {
            out.push(record);
        }
        for entry in self.wal.get_records()? {
            out.push(entry.record);
        }
        Ok(out)
    }

    /// Clear D/E/F/G and replay every record ever appended (segments, then
    /// WAL, in that order) through [`Self::apply_fan_out`] (spec §4.H
    /// `rebuildIndexes`). Does not touch the WAL or segment files themselves.
    pub fn rebuild(&mut self) -> VaultResult<usize> {
        self.latest.clear();
        self.merkle = MerkleTree::new(self.algo);
        self.vector = VectorIndex::new(self.hnsw_params, self.hnsw_seed);
        self.text = TextIndex::new(self.bm25_params);

        let mut count = 0;
        for (record, segment_number, offset) in self.segments.iterate_all()? {
            self.apply_fan_out(&record, Location::Segment { segment_number, offset });
            count += 1;
        }
        for entry in self.wal.get_records()? {
            self.apply_fan_out(&entry.record, Location::Wal { offset: entry.offset });
            count += 1;
        }
        self.dirty = true;
        Ok(count)
    }

    pub fn segment_by_number(&self, number: u32) -> Option<&Segment> {
        self.segments.segment(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultmem_core::record::Memory;

    fn memory(id: &str, algo: HashAlgorithm) -> Record {
        Record::Memory(Memory::new_v1(
            id.to_string(),
            "main".to_string(),
            1_000,
            "note".to_string(),
            "fact".to_string(),
            "hello world".to_string(),
            vec!["x".to_string()],
            5,
            None,
            None,
            None,
            None,
            algo,
        ))
    }

    fn open_instance(dir: &std::path::Path) -> (StoreInstance, Layout, VaultConfig) {
        let config = VaultConfig::default();
        let layout = Layout::new(dir.to_path_buf());
        let instance = StoreInstance::open(&layout, "main", &config).unwrap();
        (instance, layout, config)
    }

    #[test]
    fn append_and_fan_out_updates_latest_and_merkle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instance, layout, _config) = open_instance(dir.path());
        let record = memory("m1", instance.algo);

        instance.append_and_fan_out(&layout, &record, 1_000).unwrap();

        assert!(instance.latest.has(IndexKind::Memory, "m1"));
        assert_eq!(instance.merkle.leaf_count(), 1);
        let fetched = instance.get_record(IndexKind::Memory, "m1").unwrap().unwrap();
        assert_eq!(fetched.id(), "m1");
    }

    #[test]
    fn rotate_moves_wal_records_into_a_segment_and_repoints_latest() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instance, layout, _config) = open_instance(dir.path());
        let record = memory("m1", instance.algo);
        instance.append_and_fan_out(&layout, &record, 1_000).unwrap();

        let moved = instance.rotate().unwrap();
        assert_eq!(moved, 1);

        let entry = instance.latest.get(IndexKind::Memory, "m1").unwrap();
        assert!(matches!(entry.location, Location::Segment { .. }));
        let fetched = instance.get_record(IndexKind::Memory, "m1").unwrap().unwrap();
        assert_eq!(fetched.id(), "m1");
    }

    #[test]
    fn rebuild_reproduces_the_same_merkle_root() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instance, layout, _config) = open_instance(dir.path());
        for i in 0..5 {
            let record = memory(&format!("m{i}"), instance.algo);
            instance.append_and_fan_out(&layout, &record, 1_000 + i as i64).unwrap();
        }
        instance.rotate().unwrap();
        let root_before = instance.merkle.root().map(str::to_string);

        let replayed = instance.rebuild().unwrap();
        assert_eq!(replayed, 5);
        assert_eq!(instance.merkle.root().map(str::to_string), root_before);
    }
}
