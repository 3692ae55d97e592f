//! # vaultmem-vector
//!
//! An HNSW (hierarchical navigable small world) approximate-nearest-neighbor
//! index over live memory embeddings (spec §4.F). Only the latest version of
//! a memory is represented; deletions remove the node entirely.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use vaultmem_core::constants::INDEX_SNAPSHOT_VERSION;
use vaultmem_core::errors::VectorIndexError;

const MAX_LEVEL_CAP: usize = 16;

/// Tuning parameters for a [`VectorIndex`] (spec §4.F).
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub dimensions: usize,
}

impl HnswParams {
    pub fn m0(&self) -> usize {
        self.m * 2
    }

    fn ml(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    vector: Vec<f32>,
    level: usize,
    /// `neighbors[l]` holds the ids connected at layer `l`, for `l` in `0..=level`.
    neighbors: Vec<Vec<String>>,
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    1.0 - similarity
}

/// A `(distance, id)` pair ordered by distance, used for both the
/// min-heap-of-candidates and the bounded max-heap-of-results in
/// [`VectorIndex::search_layer`].
#[derive(Debug, Clone, PartialEq)]
struct ScoredId {
    distance: f32,
    id: String,
}

impl Eq for ScoredId {}

impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Reverses ordering so a `BinaryHeap<MinScored>` behaves as a min-heap by
/// distance (`BinaryHeap` is a max-heap by default).
#[derive(Debug, Clone, PartialEq, Eq)]
struct MinScored(ScoredId);

impl PartialOrd for MinScored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinScored {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// An HNSW graph over embeddings, keyed by memory id.
#[derive(Debug)]
pub struct VectorIndex {
    params: HnswParams,
    nodes: HashMap<String, Node>,
    entry_point: Option<String>,
    max_level: usize,
    rng: ChaCha8Rng,
}

impl VectorIndex {
    /// Construct an empty index with a deterministic per-store RNG seed, so
    /// level assignment (and therefore graph shape) is reproducible across
    /// runs given the same insert order (spec §4.F).
    pub fn new(params: HnswParams, seed: u64) -> Self {
        VectorIndex {
            params,
            nodes: HashMap::new(),
            entry_point: None,
            max_level: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn random_level(&mut self) -> usize {
        let p = 1.0 / self.params.m as f64;
        let mut level = 0;
        while self.rng.gen::<f64>() < p && level < MAX_LEVEL_CAP {
            level += 1;
        }
        level
    }

    fn distance_to(&self, query: &[f32], id: &str) -> f32 {
        cosine_distance(query, &self.nodes[id].vector)
    }

    /// Standard HNSW beam search at a single layer: a min-heap of candidates
    /// and a bounded max-heap (by worst-first) of results, both keyed by
    /// distance (spec §4.F `search_layer`).
    fn search_layer(&self, query: &[f32], entry: &str, ef: usize, layer: usize) -> Vec<ScoredId> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(entry.to_string());

        let entry_dist = self.distance_to(query, entry);
        let mut candidates: BinaryHeap<MinScored> =
            BinaryHeap::from([MinScored(ScoredId { distance: entry_dist, id: entry.to_string() })]);
        let mut results: BinaryHeap<ScoredId> =
            BinaryHeap::from([ScoredId { distance: entry_dist, id: entry.to_string() }]);

        while let Some(MinScored(current)) = candidates.pop() {
            let worst_in_results = results.peek().map(|s| s.distance).unwrap_or(f32::INFINITY);
            if current.distance > worst_in_results && results.len() >= ef {
                break;
            }

            let neighbor_ids = self
                .nodes
                .get(&current.id)
                .and_then(|n| n.neighbors.get(layer))
                .cloned()
                .unwrap_or_default();

            for neighbor_id in neighbor_ids {
                if !visited.insert(neighbor_id.clone()) {
                    continue;
                }
                let dist = self.distance_to(query, &neighbor_id);
                let worst = results.peek().map(|s| s.distance).unwrap_or(f32::INFINITY);
                if results.len() < ef || dist < worst {
                    candidates.push(MinScored(ScoredId { distance: dist, id: neighbor_id.clone() }));
                    results.push(ScoredId { distance: dist, id: neighbor_id });
                    while results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<ScoredId> = results.into_vec();
        out.sort();
        out
    }

    /// Insert or replace the embedding for `id` (spec §4.F `Insert`).
    pub fn insert(&mut self, id: &str, vector: Vec<f32>) -> Result<(), VectorIndexError> {
        if vector.len() != self.params.dimensions {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.params.dimensions,
                actual: vector.len(),
            });
        }
        if self.nodes.contains_key(id) {
            self.remove(id);
        }

        let level = self.random_level();

        if self.nodes.is_empty() {
            self.nodes.insert(
                id.to_string(),
                Node { vector, level, neighbors: vec![Vec::new(); level + 1] },
            );
            self.entry_point = Some(id.to_string());
            self.max_level = level;
            return Ok(());
        }

        let mut entry = self.entry_point.clone().unwrap();
        for l in ((level + 1)..=self.max_level).rev() {
            let nearest = self.search_layer(&vector, &entry, 1, l);
            if let Some(best) = nearest.first() {
                entry = best.id.clone();
            }
        }

        self.nodes.insert(
            id.to_string(),
            Node { vector: vector.clone(), level, neighbors: vec![Vec::new(); level + 1] },
        );

        for l in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(&vector, &entry, self.params.ef_construction, l);
            let max_conn = if l == 0 { self.params.m0() } else { self.params.m };
            let chosen: Vec<String> = candidates.iter().take(max_conn).map(|s| s.id.clone()).collect();

            if let Some(node) = self.nodes.get_mut(id) {
                node.neighbors[l] = chosen.clone();
            }
            for neighbor_id in &chosen {
                self.add_bidirectional_edge(neighbor_id, id, l, max_conn);
            }

            if let Some(best) = candidates.first() {
                entry = best.id.clone();
            }
        }

        if level > self.max_level {
            self.entry_point = Some(id.to_string());
            self.max_level = level;
        }

        Ok(())
    }

    fn add_bidirectional_edge(&mut self, neighbor_id: &str, new_id: &str, layer: usize, max_conn: usize) {
        let neighbor_vector = match self.nodes.get(neighbor_id) {
            Some(n) => n.vector.clone(),
            None => return,
        };

        if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
            if layer >= neighbor.neighbors.len() {
                return;
            }
            if !neighbor.neighbors[layer].contains(&new_id.to_string()) {
                neighbor.neighbors[layer].push(new_id.to_string());
            }
        }

        let needs_prune = self
            .nodes
            .get(neighbor_id)
            .map(|n| n.neighbors[layer].len() > max_conn)
            .unwrap_or(false);
        if needs_prune {
            let mut scored: Vec<ScoredId> = self.nodes[neighbor_id].neighbors[layer]
                .iter()
                .map(|other_id| ScoredId {
                    distance: cosine_distance(&neighbor_vector, &self.nodes[other_id].vector),
                    id: other_id.clone(),
                })
                .collect();
            scored.sort();
            scored.truncate(max_conn);
            if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
                neighbor.neighbors[layer] = scored.into_iter().map(|s| s.id).collect();
            }
        }
    }

    /// Remove `id` from every layer it participates in, and from every
    /// neighbor's connection set (spec §4.F `Remove`).
    pub fn remove(&mut self, id: &str) {
        let Some(node) = self.nodes.remove(id) else { return };

        for (layer, neighbor_ids) in node.neighbors.iter().enumerate() {
            for neighbor_id in neighbor_ids {
                if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
                    if layer < neighbor.neighbors.len() {
                        neighbor.neighbors[layer].retain(|n| n != id);
                    }
                }
            }
        }

        if self.entry_point.as_deref() == Some(id) {
            self.entry_point = self
                .nodes
                .iter()
                .max_by_key(|(_, n)| n.level)
                .map(|(other_id, n)| {
                    self.max_level = n.level;
                    other_id.clone()
                });
            if self.entry_point.is_none() {
                self.max_level = 0;
            }
        }
    }

    /// Find the `k` nearest live embeddings to `query` (spec §4.F `Search`).
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_override: Option<usize>,
    ) -> Result<Vec<(String, f32)>, VectorIndexError> {
        if query.len() != self.params.dimensions {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.params.dimensions,
                actual: query.len(),
            });
        }
        let Some(entry_point) = &self.entry_point else { return Ok(Vec::new()) };
        let ef = ef_override.unwrap_or(self.params.ef_search).max(k);

        let mut entry = entry_point.clone();
        for l in (1..=self.max_level).rev() {
            let nearest = self.search_layer(query, &entry, 1, l);
            if let Some(best) = nearest.first() {
                entry = best.id.clone();
            }
        }

        let results = self.search_layer(query, &entry, ef, 0);
        Ok(results
            .into_iter()
            .take(k)
            .map(|s| (s.id, 1.0 - s.distance))
            .collect())
    }

    /// Persist every node's vector, level, and per-layer neighbor lists, plus
    /// `entry_point`/`max_level`.
    pub fn save(&self, path: &Path) -> Result<(), VectorIndexError> {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            dimensions: usize,
            entry_point: &'a Option<String>,
            max_level: usize,
            nodes: &'a HashMap<String, Node>,
        }
        let file = File::create(path).map_err(|e| VectorIndexError::InvalidParameter {
            name: "path".into(),
            reason: e.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&INDEX_SNAPSHOT_VERSION.to_le_bytes())
            .map_err(|e| VectorIndexError::InvalidParameter { name: "path".into(), reason: e.to_string() })?;
        let snapshot = Snapshot {
            dimensions: self.params.dimensions,
            entry_point: &self.entry_point,
            max_level: self.max_level,
            nodes: &self.nodes,
        };
        serde_json::to_writer(&mut writer, &snapshot).map_err(|e| VectorIndexError::InvalidParameter {
            name: "snapshot".into(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Load a snapshot written by [`Self::save`]. Fails loudly on an unknown
    /// format version or a dimension mismatch against `params`.
    pub fn load(path: &Path, params: HnswParams, seed: u64) -> Result<Self, VectorIndexError> {
        #[derive(Deserialize)]
        struct Snapshot {
            dimensions: usize,
            entry_point: Option<String>,
            max_level: usize,
            nodes: HashMap<String, Node>,
        }
        let file = File::open(path).map_err(|e| VectorIndexError::InvalidParameter {
            name: "path".into(),
            reason: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);
        let mut version_bytes = [0u8; 4];
        reader
            .read_exact(&mut version_bytes)
            .map_err(|e| VectorIndexError::InvalidParameter { name: "path".into(), reason: e.to_string() })?;
        let version = u32::from_le_bytes(version_bytes);
        if version != INDEX_SNAPSHOT_VERSION {
            return Err(VectorIndexError::UnsupportedVersion { version });
        }
        let snapshot: Snapshot = serde_json::from_reader(reader).map_err(|e| VectorIndexError::InvalidParameter {
            name: "snapshot".into(),
            reason: e.to_string(),
        })?;
        if snapshot.dimensions != params.dimensions {
            return Err(VectorIndexError::DimensionMismatch {
                expected: params.dimensions,
                actual: snapshot.dimensions,
            });
        }
        Ok(VectorIndex {
            params,
            nodes: snapshot.nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HnswParams {
        HnswParams { m: 8, ef_construction: 32, ef_search: 16, dimensions: 4 }
    }

    fn unit(i: usize, dims: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[i % dims] = 1.0;
        v[(i + 1) % dims] = 0.1 * (i as f32);
        v
    }

    #[test]
    fn m0_is_twice_m() {
        assert_eq!(params().m0(), 16);
    }

    #[test]
    fn search_finds_nearest_neighbor() {
        let mut idx = VectorIndex::new(params(), 42);
        for i in 0..20 {
            idx.insert(&format!("id{i}"), unit(i, 4)).unwrap();
        }
        let query = unit(5, 4);
        let results = idx.search(&query, 3, None).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, "id5");
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut idx = VectorIndex::new(params(), 1);
        let err = idx.insert("a", vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, VectorIndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn remove_excludes_from_future_searches() {
        let mut idx = VectorIndex::new(params(), 7);
        for i in 0..10 {
            idx.insert(&format!("id{i}"), unit(i, 4)).unwrap();
        }
        idx.remove("id3");
        assert!(!idx.contains("id3"));
        let results = idx.search(&unit(3, 4), 10, None).unwrap();
        assert!(!results.iter().any(|(id, _)| id == "id3"));
    }

    #[test]
    fn reinserting_an_id_replaces_its_vector() {
        let mut idx = VectorIndex::new(params(), 3);
        idx.insert("a", unit(0, 4)).unwrap();
        idx.insert("a", unit(2, 4)).unwrap();
        assert_eq!(idx.len(), 1);
        let results = idx.search(&unit(2, 4), 1, None).unwrap();
        assert_eq!(results[0].0, "a");
    }

    #[test]
    fn same_seed_and_insert_order_is_reproducible() {
        let mut a = VectorIndex::new(params(), 99);
        let mut b = VectorIndex::new(params(), 99);
        for i in 0..15 {
            a.insert(&format!("id{i}"), unit(i, 4)).unwrap();
            b.insert(&format!("id{i}"), unit(i, 4)).unwrap();
        }
        assert_eq!(a.max_level, b.max_level);
        assert_eq!(a.entry_point, b.entry_point);
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.idx");
        let mut idx = VectorIndex::new(params(), 11);
        for i in 0..5 {
            idx.insert(&format!("id{i}"), unit(i, 4)).unwrap();
        }
        idx.save(&path).unwrap();

        let loaded = VectorIndex::load(&path, params(), 11).unwrap();
        assert_eq!(loaded.len(), 5);
        let results = loaded.search(&unit(2, 4), 1, None).unwrap();
        assert_eq!(results[0].0, "id2");
    }

    #[test]
    fn load_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vector.idx");
        let idx = VectorIndex::new(params(), 11);
        idx.save(&path).unwrap();

        let mismatched = HnswParams { dimensions: 8, ..params() };
        let err = VectorIndex::load(&path, mismatched, 11).unwrap_err();
        assert!(matches!(err, VectorIndexError::DimensionMismatch { .. }));
    }
}
