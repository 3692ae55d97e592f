//! Recovery, rebuild, and compaction (spec §4.H "Recovery, rebuild,
//! compaction"). All three operate only on the already-durable log
//! (segments + WAL); none of them can lose data, only recompute derived
//! state from it (spec §3 "indexes are derived views", invariant
//! REBUILDABLE).

use vaultmem_core::errors::VaultResult;
use vaultmem_merkle::MerkleTree;

use crate::instance::StoreInstance;
use crate::layout::Layout;

/// One mismatch kind surfaced by [`verify_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityMismatch {
    MerkleRootMismatch { expected: Option<String>, found: Option<String> },
    RecordCountMismatch { expected: usize, found: usize },
}

/// Stream every record from segments then WAL, rebuild a throwaway Merkle
/// tree, and compare its root and leaf count against the live tree.
pub fn verify_integrity(instance: &mut StoreInstance) -> VaultResult<Vec<IntegrityMismatch>> {
    let records = instance.iterate_all_records()?;
    let mut shadow = MerkleTree::new(instance.algo);
    for record in &records {
        shadow.add_leaf(record.content_hash().to_string());
    }

    let mut mismatches = Vec::new();
    if shadow.root() != instance.merkle.root() {
        mismatches.push(IntegrityMismatch::MerkleRootMismatch {
            expected: instance.merkle.root().map(str::to_string),
            found: shadow.root().map(str::to_string),
        });
    }
    if shadow.leaf_count() != instance.merkle.leaf_count() {
        mismatches.push(IntegrityMismatch::RecordCountMismatch {
            expected: instance.merkle.leaf_count(),
            found: shadow.leaf_count(),
        });
    }
    Ok(mismatches)
}

/// Clear D/E/F/G and replay segments then WAL through the standard
/// fan-out, then persist the rebuilt snapshots.
pub fn rebuild_indexes(instance: &mut StoreInstance, layout: &Layout) -> VaultResult<usize> {
    let count = instance.rebuild()?;
    instance.persist(layout)?;
    Ok(count)
}

/// `needs = (merkle_leaf_count != segment_records + wal_records)`.
pub fn check_recovery_needed(instance: &mut StoreInstance) -> VaultResult<bool> {
    let total = instance.total_record_count()?;
    Ok(instance.merkle.leaf_count() != total)
}

/// Rebuild if (and only if) [`check_recovery_needed`] says so.
pub fn recover(instance: &mut StoreInstance, layout: &Layout) -> VaultResult<bool> {
    if check_recovery_needed(instance)? {
        rebuild_indexes(instance, layout)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Force rotation if the WAL holds any records, returning
/// `(rotated, total_record_count)`.
pub fn compact_wal(instance: &mut StoreInstance, layout: &Layout) -> VaultResult<(bool, usize)> {
    if instance.wal.is_empty() {
        return Ok((false, instance.total_record_count()?));
    }
    instance.rotate()?;
    instance.persist(layout)?;
    Ok((true, instance.total_record_count()?))
}
