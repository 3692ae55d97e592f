//! End-to-end scenarios over [`VaultEngine`] (spec §8): each test drives the
//! public API the way an embedding caller would, against a real `tempfile`
//! data directory.

use std::thread::sleep;
use std::time::Duration;

use tempfile::tempdir;

use vaultmem_core::config::VaultConfig;
use vaultmem_core::errors::VaultError;
use vaultmem_core::record::RelationshipType;
use vaultmem_core::traits::Embedder;
use vaultmem_core::VaultResult;
use vaultmem_engine::{ListMemoriesOptions, MemoryInput, SearchMode, SearchOptions, VaultEngine};

/// A tiny deterministic embedder: hashes each word into one of 8 buckets so
/// that semantically similar short test strings land near each other
/// without pulling in a real model.
struct WordBucketEmbedder;

impl Embedder for WordBucketEmbedder {
    fn embed(&self, text: &str) -> VaultResult<Vec<f32>> {
        let mut v = vec![0.0f32; 8];
        for word in text.split_whitespace() {
            let bucket = word.bytes().fold(0u32, |acc, b| acc.wrapping_add(b as u32)) % 8;
            v[bucket as usize] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> Option<usize> {
        Some(8)
    }
}

fn small_config() -> VaultConfig {
    let mut cfg = VaultConfig::default();
    cfg.hnsw.dimensions = 8;
    cfg.hnsw.m = 4;
    cfg.hnsw.ef_construction = 16;
    cfg.hnsw.ef_search = 16;
    cfg
}

fn input(content: &str) -> MemoryInput {
    MemoryInput {
        category: "note".into(),
        memory_type: "fact".into(),
        content: content.into(),
        tags: vec!["b".into(), "a".into()],
        importance: 5,
        cadence_type: None,
        cadence_value: None,
        context: None,
    }
}

fn open(dir: &std::path::Path, embedder: bool) -> VaultEngine {
    let config = small_config();
    let embedder: Option<Box<dyn Embedder>> = if embedder { Some(Box::new(WordBucketEmbedder)) } else { None };
    VaultEngine::open(Some(dir.to_path_buf()), config, embedder).expect("engine opens")
}

#[test]
fn open_falls_back_to_configured_data_dir_when_none_given() {
    let dir = tempdir().unwrap();
    let mut config = small_config();
    config.storage.data_dir = dir.path().to_string_lossy().into_owned();

    let engine = VaultEngine::open(None, config, None).expect("engine opens from config data_dir");
    engine.add_memory("main", "m1".into(), input("x")).unwrap();

    assert!(dir.path().join("store.json").exists());
    assert!(engine.get_memory("main", "m1").unwrap().is_some());
}

#[test]
fn add_then_get_round_trips() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), true);

    let memory = engine.add_memory("main", "m1".into(), input("the quick fox")).unwrap();
    assert_eq!(memory.version, 1);
    assert!(memory.prev_hash.is_none());
    assert_eq!(memory.tags, vec!["a".to_string(), "b".to_string()]);

    let fetched = engine.get_memory("main", "m1").unwrap().expect("memory exists");
    assert_eq!(fetched.memory_id, "m1");
    assert_eq!(fetched.content, "the quick fox");
    assert_eq!(fetched.content_hash, memory.content_hash);
}

#[test]
fn update_preserves_version_chain_and_embedding_policy() {
    let dir = tempdir().unwrap();
    // No embedder: content-changing updates must clear the embedding
    // (spec §9, preserved verbatim).
    let engine = open(dir.path(), false);

    let v1 = engine.add_memory("main", "m1".into(), input("alpha")).unwrap();
    assert!(v1.embedding.is_none());

    let v2 = engine.update_memory("main", "m1", input("alpha")).unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.prev_hash.as_deref(), Some(v1.content_hash.as_str()));
    assert_eq!(v2.content, "alpha");

    let v3 = engine.update_memory("main", "m1", input("beta")).unwrap();
    assert_eq!(v3.version, 3);
    assert_eq!(v3.prev_hash.as_deref(), Some(v2.content_hash.as_str()));
    assert!(v3.embedding.is_none());
}

#[test]
fn soft_delete_is_filtered_from_listing_by_default() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);

    engine.add_memory("main", "m1".into(), input("keep me")).unwrap();
    engine.add_memory("main", "m2".into(), input("delete me")).unwrap();
    engine.delete_memory("main", "m2").unwrap();

    let live = engine.list_memories("main", &ListMemoriesOptions::default()).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].memory_id, "m1");

    let with_deleted =
        engine.list_memories("main", &ListMemoriesOptions { include_deleted: true, ..Default::default() }).unwrap();
    assert_eq!(with_deleted.len(), 2);
    let m2 = with_deleted.iter().find(|m| m.memory_id == "m2").unwrap();
    assert!(m2.deleted);

    // getMemory still resolves the current (deleted) version.
    let fetched = engine.get_memory("main", "m2").unwrap().unwrap();
    assert!(fetched.deleted);
}

#[test]
fn list_memories_offset_counts_positions_before_category_filtering() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);

    let mut b = input("first, category b");
    b.category = "B".into();
    engine.add_memory("main", "m1".into(), b).unwrap();
    let mut a1 = input("second, category a");
    a1.category = "A".into();
    engine.add_memory("main", "m2".into(), a1).unwrap();
    let mut a2 = input("third, category a");
    a2.category = "A".into();
    engine.add_memory("main", "m3".into(), a2).unwrap();

    // Raw D order (sorted by id) is [m1(B), m2(A), m3(A)]. offset=1 skips
    // m1 in that raw stream before the category filter runs, so both m2
    // and m3 survive — not just m3, which is what filtering-then-skipping
    // would wrongly produce.
    let options = ListMemoriesOptions { category: Some("A".into()), offset: 1, ..Default::default() };
    let results = engine.list_memories("main", &options).unwrap();
    let ids: Vec<&str> = results.iter().map(|m| m.memory_id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m3"]);
}

#[test]
fn rotation_keeps_every_record_readable_and_integrity_intact() {
    let dir = tempdir().unwrap();
    let mut config = small_config();
    // Force rotation after a handful of small writes.
    config.storage.segment_size_bytes = vaultmem_core::config::defaults::MIN_SEGMENT_SIZE_BYTES;
    let embedder: Option<Box<dyn Embedder>> = None;
    let engine = VaultEngine::open(Some(dir.path().to_path_buf()), config, embedder).unwrap();

    let mut ids = Vec::new();
    for i in 0..40 {
        let id = format!("m{i}");
        engine.add_memory("main", id.clone(), input(&format!("memory number {i} with some padding text"))).unwrap();
        ids.push(id);
    }
    // Force any remaining WAL tail into a segment too.
    engine.compact_wal("main").unwrap();

    for id in &ids {
        let fetched = engine.get_memory("main", id).unwrap();
        assert!(fetched.is_some(), "record {id} should survive rotation");
    }

    let mismatches = engine.verify_integrity("main").unwrap();
    assert!(mismatches.is_empty(), "unexpected integrity mismatches: {mismatches:?}");
}

#[test]
fn hybrid_search_ranks_best_match_first() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), true);

    engine.add_memory("main", "cat".into(), input("the cat sleeps on the mat")).unwrap();
    engine.add_memory("main", "dog".into(), input("the dog runs in the park")).unwrap();
    engine.add_memory("main", "car".into(), input("the car drives down the road")).unwrap();

    let options = SearchOptions { query: "cat mat".into(), mode: SearchMode::Hybrid, limit: 3, semantic_weight: 0.7 };
    let results = engine.search("main", &options).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].memory.memory_id, "cat");
    // Scores are sorted non-increasing.
    for pair in results.windows(2) {
        assert!(pair[0].search_score >= pair[1].search_score);
    }
}

#[test]
fn text_only_search_works_without_any_embedder_configured() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);

    engine.add_memory("main", "a".into(), input("lexical search over plain content")).unwrap();
    engine.add_memory("main", "b".into(), input("unrelated memory about gardening")).unwrap();

    let options = SearchOptions { query: "lexical content".into(), mode: SearchMode::Text, limit: 5, ..SearchOptions::default() };
    let results = engine.search("main", &options).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].memory.memory_id, "a");
}

#[test]
fn fork_is_isolated_from_its_source() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);

    engine.add_memory("main", "m1".into(), input("original content")).unwrap();
    let fork_meta = engine.create_fork("main", Some("fork-a".into()), None, None).unwrap();
    assert_eq!(fork_meta.fork_id, "fork-a");
    assert_eq!(fork_meta.source_store_id, "main");

    // Writes to the fork must not leak back into main.
    engine.update_memory("fork-a", "m1", input("changed in fork")).unwrap();
    engine.add_memory("fork-a", "m2".into(), input("fork-only memory")).unwrap();

    let main_m1 = engine.get_memory("main", "m1").unwrap().unwrap();
    assert_eq!(main_m1.content, "original content");
    assert!(engine.get_memory("main", "m2").unwrap().is_none());

    let fork_m1 = engine.get_memory("fork-a", "m1").unwrap().unwrap();
    assert_eq!(fork_m1.content, "changed in fork");
}

#[test]
fn create_fork_rejects_an_existing_fork_id() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);
    engine.add_memory("main", "m1".into(), input("x")).unwrap();
    engine.create_fork("main", Some("dup".into()), None, None).unwrap();

    let err = engine.create_fork("main", Some("dup".into()), None, None).unwrap_err();
    assert!(matches!(err, VaultError::Engine(_)));
}

#[test]
fn pitr_fork_excludes_writes_after_the_cutoff() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);

    let before = engine.add_memory("main", "m1".into(), input("first")).unwrap();
    sleep(Duration::from_millis(5));
    let cutoff = before.timestamp + 2;
    sleep(Duration::from_millis(5));
    engine.add_memory("main", "m2".into(), input("second, after cutoff")).unwrap();

    let meta = engine.create_fork_at_time("main", Some("pitr".into()), cutoff, None, None).unwrap();
    assert_eq!(meta.pitr_timestamp, Some(cutoff));

    assert!(engine.get_memory("pitr", "m1").unwrap().is_some());
    assert!(engine.get_memory("pitr", "m2").unwrap().is_none());
    // Main is untouched by the PITR replay.
    assert!(engine.get_memory("main", "m2").unwrap().is_some());
}

#[test]
fn relationships_round_trip_and_soft_delete() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);
    engine.add_memory("main", "m1".into(), input("a")).unwrap();
    engine.add_memory("main", "m2".into(), input("b")).unwrap();

    let rel = engine
        .add_relationship("main", "r1".into(), "m1".into(), "m2".into(), RelationshipType::RelatedTo)
        .unwrap();
    assert_eq!(rel.version, 1);

    let fetched = engine.get_relationship("main", "r1").unwrap().unwrap();
    assert_eq!(fetched.memory_id, "m1");
    assert_eq!(fetched.related_memory_id, "m2");

    let removed = engine.remove_relationship("main", "r1").unwrap();
    assert!(removed.deleted);
    let still_there = engine.get_relationship("main", "r1").unwrap().unwrap();
    assert!(still_there.deleted);
}

#[test]
fn rebuild_indexes_is_idempotent_and_preserves_reads() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);
    engine.add_memory("main", "m1".into(), input("one")).unwrap();
    engine.add_memory("main", "m2".into(), input("two")).unwrap();
    engine.delete_memory("main", "m2").unwrap();

    let needs_before = engine.check_recovery_needed("main").unwrap();
    assert!(!needs_before, "freshly written indexes should already be consistent");

    let replayed = engine.rebuild_indexes("main").unwrap();
    assert!(replayed >= 3); // m1 v1, m2 v1, m2 v2 (deleted)

    let live = engine.list_memories("main", &ListMemoriesOptions::default()).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].memory_id, "m1");

    let mismatches = engine.verify_integrity("main").unwrap();
    assert!(mismatches.is_empty());
}

#[test]
fn delete_fork_refuses_main_and_removes_others() {
    let dir = tempdir().unwrap();
    let engine = open(dir.path(), false);
    engine.add_memory("main", "m1".into(), input("x")).unwrap();
    engine.create_fork("main", Some("temp".into()), None, None).unwrap();

    assert!(engine.delete_fork("main").is_err());
    assert!(engine.delete_fork("temp").is_ok());
    // Recreating under the same id must now succeed again.
    engine.create_fork("main", Some("temp".into()), None, None).unwrap();
}
