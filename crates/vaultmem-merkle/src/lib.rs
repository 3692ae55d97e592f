//! # vaultmem-merkle
//!
//! An append-only canonical Merkle tree over record content hashes (spec
//! §4.E), used for snapshotting and divergence detection across forks.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use vaultmem_core::constants::INDEX_SNAPSHOT_VERSION;
use vaultmem_core::errors::MerkleError;
use vaultmem_core::record::{hex_decode, HashAlgorithm};

/// Which side of a pair a sibling hash occupied before canonical sorting.
/// Emitted for API symmetry; ignored by [`hash_pair`], which is
/// order-insensitive (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// One sibling hash encountered while walking from a leaf to the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: String,
    pub side: Side,
}

/// An inclusion proof for one leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: String,
    pub siblings: Vec<ProofStep>,
    pub root: String,
}

/// `H(min(x,y) || max(x,y))` — canonical pairing that erases left/right
/// position so equal-prefix forks produce identical sub-roots (spec §9).
pub fn hash_pair(algo: HashAlgorithm, a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let lo_bytes = hex_decode(lo).expect("leaf/node hash must be valid hex");
    let hi_bytes = hex_decode(hi).expect("leaf/node hash must be valid hex");
    let mut buf = Vec::with_capacity(lo_bytes.len() + hi_bytes.len());
    buf.extend_from_slice(&lo_bytes);
    buf.extend_from_slice(&hi_bytes);
    algo.hash_hex(&buf)
}

fn build_levels(algo: HashAlgorithm, leaves: &[String]) -> Vec<Vec<String>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves.to_vec()];
    while levels.last().unwrap().len() > 1 {
        let current = levels.last().unwrap();
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut i = 0;
        while i < current.len() {
            if i + 1 < current.len() {
                next.push(hash_pair(algo, &current[i], &current[i + 1]));
                i += 2;
            } else {
                // A lonely node propagates upward until paired (spec §4.E).
                next.push(current[i].clone());
                i += 1;
            }
        }
        levels.push(next);
    }
    levels
}

/// An append-only canonical Merkle tree. Leaves are content hashes in append
/// order; the tree is rebuilt from the leaf list on every mutation, which is
/// the "simple implementation" the spec explicitly allows in place of a
/// sparse incremental node cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleTree {
    algo: HashAlgorithm,
    leaves: Vec<String>,
    #[serde(skip)]
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    pub fn new(algo: HashAlgorithm) -> Self {
        MerkleTree { algo, leaves: Vec::new(), levels: Vec::new() }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    /// The current root, or `None` for an empty tree.
    pub fn root(&self) -> Option<&str> {
        self.levels.last().and_then(|l| l.first()).map(|s| s.as_str())
    }

    /// Append a leaf and recompute the root (spec §4.E `add_leaf`).
    pub fn add_leaf(&mut self, leaf_hash: String) -> String {
        self.leaves.push(leaf_hash);
        self.levels = build_levels(self.algo, &self.leaves);
        self.root().unwrap().to_string()
    }

    /// Generate an inclusion proof for the leaf at `leaf_index`.
    pub fn generate_proof(&self, leaf_index: usize) -> Result<MerkleProof, MerkleError> {
        if leaf_index >= self.leaves.len() {
            return Err(MerkleError::LeafOutOfRange {
                index: leaf_index,
                len: self.leaves.len(),
            });
        }
        let mut siblings = Vec::new();
        let mut idx = leaf_index;
        for level in &self.levels {
            if level.len() <= 1 {
                break;
            }
            let (sibling_idx, side) = if idx % 2 == 0 {
                (idx + 1, Side::Right)
            } else {
                (idx - 1, Side::Left)
            };
            if let Some(sibling) = level.get(sibling_idx) {
                siblings.push(ProofStep { hash: sibling.clone(), side });
            }
            idx /= 2;
        }
        Ok(MerkleProof {
            leaf_index,
            leaf_hash: self.leaves[leaf_index].clone(),
            siblings,
            root: self.root().expect("non-empty tree has a root").to_string(),
        })
    }

    /// Verify a proof by walking the siblings with [`hash_pair`].
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        let mut current = proof.leaf_hash.clone();
        for step in &proof.siblings {
            current = hash_pair(self.algo, &current, &step.hash);
        }
        current == proof.root
    }

    /// Rebuild from the stored leaves and compare roots (spec §4.E, §8 MERKLE).
    pub fn verify_integrity(&self) -> Result<(), MerkleError> {
        let rebuilt = build_levels(self.algo, &self.leaves);
        let rebuilt_root = rebuilt.last().and_then(|l| l.first()).cloned();
        if rebuilt_root.as_deref() != self.root() {
            return Err(MerkleError::Corrupt {
                stored: self.root().unwrap_or("<empty>").to_string(),
                rebuilt: rebuilt_root.unwrap_or_else(|| "<empty>".to_string()),
            });
        }
        Ok(())
    }

    /// First index where this tree's leaves disagree with `other`'s; if one
    /// is a prefix of the other, returns the shorter length.
    pub fn find_divergence_point(&self, other: &MerkleTree) -> Option<usize> {
        let min_len = self.leaves.len().min(other.leaves.len());
        for i in 0..min_len {
            if self.leaves[i] != other.leaves[i] {
                return Some(i);
            }
        }
        if self.leaves.len() != other.leaves.len() {
            Some(min_len)
        } else {
            None
        }
    }

    /// Persist just the leaves (the root is re-derived on load and checked).
    pub fn save(&self, path: &Path) -> Result<(), MerkleError> {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            algo: HashAlgorithm,
            leaves: &'a [String],
        }
        let file = File::create(path).map_err(|e| MerkleError::Corrupt {
            stored: String::new(),
            rebuilt: e.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&INDEX_SNAPSHOT_VERSION.to_le_bytes())
            .map_err(|e| MerkleError::Corrupt { stored: String::new(), rebuilt: e.to_string() })?;
        let snapshot = Snapshot { algo: self.algo, leaves: &self.leaves };
        serde_json::to_writer(&mut writer, &snapshot).map_err(|e| MerkleError::Corrupt {
            stored: String::new(),
            rebuilt: e.to_string(),
        })?;
        Ok(())
    }

    /// Load a snapshot, replay all leaves, and verify the root
    /// (`MERKLE_CORRUPT` on mismatch is not reachable here since the root is
    /// always re-derived — mirrored by [`Self::verify_integrity`] for a tree
    /// whose root was cached separately).
    pub fn load(path: &Path) -> Result<Self, MerkleError> {
        #[derive(Deserialize)]
        struct Snapshot {
            algo: HashAlgorithm,
            leaves: Vec<String>,
        }
        let file = File::open(path).map_err(|e| MerkleError::Corrupt {
            stored: String::new(),
            rebuilt: e.to_string(),
        })?;
        let mut reader = BufReader::new(file);
        let mut version_bytes = [0u8; 4];
        reader
            .read_exact(&mut version_bytes)
            .map_err(|e| MerkleError::Corrupt { stored: String::new(), rebuilt: e.to_string() })?;
        let version = u32::from_le_bytes(version_bytes);
        if version != INDEX_SNAPSHOT_VERSION {
            return Err(MerkleError::UnsupportedVersion { version });
        }
        let snapshot: Snapshot = serde_json::from_reader(reader).map_err(|e| MerkleError::Corrupt {
            stored: String::new(),
            rebuilt: e.to_string(),
        })?;
        let mut tree = MerkleTree::new(snapshot.algo);
        for leaf in snapshot.leaves {
            tree.add_leaf(leaf);
        }
        tree.verify_integrity()?;
        Ok(tree)
    }
}
