//! Forking and PITR (spec §4.H "Forking").
//!
//! A copied segment's header carries the *fork's* id (rewritten in place,
//! same trick spec applies to the WAL header), but record payloads are
//! copied byte-for-byte — `content_hash`/`prev_hash` chains are never
//! touched, since records are frozen once written (spec §3 "Ownership and
//! lifecycle"). Because rewriting a header can change its length (the
//! store id field is variable-width), any offsets captured against the old
//! header would be wrong by a constant delta; rather than hand-patch every
//! copied `Location::Segment` entry, the fork's D/E/F/G indexes are
//! recomputed by the same `rebuild()` replay `rebuildIndexes` uses, which
//! re-derives offsets from whatever the files now contain. This costs one
//! extra full replay at fork time in exchange for never trusting stale byte
//! offsets across a store-id rewrite.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use vaultmem_core::config::VaultConfig;
use vaultmem_core::constants::{MAIN_STORE_ID, WAL_FORMAT_VERSION};
use vaultmem_core::errors::{EngineError, VaultResult};

use crate::instance::StoreInstance;
use crate::layout::{ForkMetadata, ForkSummary, Layout, SnapshotRecord, StoreManifest};

const HEADER_FIXED_LEN: usize = 16;

/// Rewrite a copied WAL/segment file's header to carry `new_store_id`,
/// leaving every record frame byte-for-byte untouched. Done via a
/// write-to-temp-then-rename so a crash mid-rewrite never leaves a
/// half-written header in place (spec §4.B durability style, applied here
/// to fork setup).
fn rewrite_store_id_header(path: &Path, new_store_id: &str) -> std::io::Result<()> {
    let bytes = fs::read(path)?;
    let old_store_id_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let record_count = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
    let body = &bytes[HEADER_FIXED_LEN + old_store_id_len..];

    let mut out = Vec::with_capacity(HEADER_FIXED_LEN + new_store_id.len() + body.len());
    out.extend_from_slice(&bytes[0..4]); // magic, unchanged
    out.extend_from_slice(&WAL_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(new_store_id.len() as u32).to_le_bytes());
    out.extend_from_slice(&record_count.to_le_bytes());
    out.extend_from_slice(new_store_id.as_bytes());
    out.extend_from_slice(body);

    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(&out)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// `createFork(source_id, ...)` (spec §4.H "Forking" step 1-7).
pub fn create_fork(
    layout: &Layout,
    source: &mut StoreInstance,
    fork_id: &str,
    name: Option<String>,
    note: Option<String>,
    config: &VaultConfig,
    now_ms: i64,
) -> VaultResult<(StoreInstance, ForkMetadata)> {
    if layout.instance_dir(fork_id).exists() {
        return Err(EngineError::ForkExists { fork_id: fork_id.to_string() }.into());
    }
    source.persist(layout)?;

    let source_merkle_root = source.merkle.root().map(str::to_string);
    let source_record_count = source.total_record_count()?;

    layout.ensure_instance_dirs(fork_id)?;
    for entry in fs::read_dir(layout.segments_dir(&source.store_id))? {
        let entry = entry?;
        let dest = layout.segments_dir(fork_id).join(entry.file_name());
        fs::copy(entry.path(), &dest)?;
        rewrite_store_id_header(&dest, fork_id)?;
    }

    let fork_wal_path = layout.wal_path(fork_id);
    {
        let digest_len = source.algo.digest_len();
        let mut fork_wal = vaultmem_storage::Wal::open(
            &fork_wal_path,
            fork_id,
            digest_len,
            config.storage.wal_sync_on_write,
            config.storage.segment_size_bytes,
            config.storage.wal_max_age_ms,
        )?;
        for entry in source.wal.get_records()? {
            fork_wal.append(&entry.record)?;
        }
    }

    let mut fork_instance = StoreInstance::open(layout, fork_id, config)?;
    fork_instance.rebuild()?;
    fork_instance.persist(layout)?;

    let metadata = ForkMetadata {
        fork_id: fork_id.to_string(),
        name: name.clone(),
        note,
        source_store_id: source.store_id.clone(),
        created_at: now_ms,
        source_merkle_root,
        source_record_count,
        pitr_timestamp: None,
    };
    write_fork_metadata(layout, &metadata)?;
    register_fork_summary(layout, fork_id, &source.store_id, name, now_ms)?;

    info!(fork_id, source_id = %source.store_id, "created fork");
    Ok((fork_instance, metadata))
}

/// `createForkAtTime(source_id, cutoff_ts, ...)` — PITR (spec §4.H step
/// 1-3). Replays in canonical append order (segments then WAL) so the
/// fork's Merkle root matches the source's prefix root at `cutoff_ts`
/// exactly (ORDER-1/ORDER-3).
pub fn create_fork_at_time(
    layout: &Layout,
    source: &mut StoreInstance,
    fork_id: &str,
    cutoff_ts: i64,
    name: Option<String>,
    note: Option<String>,
    config: &VaultConfig,
    now_ms: i64,
) -> VaultResult<(StoreInstance, ForkMetadata)> {
    if layout.instance_dir(fork_id).exists() {
        return Err(EngineError::ForkExists { fork_id: fork_id.to_string() }.into());
    }

    let mut fork_instance = StoreInstance::open(layout, fork_id, config)?;
    let records = source.iterate_all_records()?;
    let mut replayed = 0usize;
    for record in records.into_iter().filter(|r| r.timestamp() <= cutoff_ts) {
        fork_instance.append_and_fan_out(layout, &record, record.timestamp())?;
        replayed += 1;
    }
    fork_instance.persist(layout)?;

    let metadata = ForkMetadata {
        fork_id: fork_id.to_string(),
        name: name.clone(),
        note,
        source_store_id: source.store_id.clone(),
        created_at: now_ms,
        source_merkle_root: fork_instance.merkle.root().map(str::to_string),
        source_record_count: replayed,
        pitr_timestamp: Some(cutoff_ts),
    };
    write_fork_metadata(layout, &metadata)?;
    register_fork_summary(layout, fork_id, &source.store_id, name, now_ms)?;

    info!(fork_id, source_id = %source.store_id, cutoff_ts, replayed, "created PITR fork");
    Ok((fork_instance, metadata))
}

/// `deleteFork(fork_id)`: refuses `main`; recursively deletes the fork
/// directory and removes its `store.json` summary. The caller is
/// responsible for dropping any already-loaded `StoreInstance` first.
pub fn delete_fork(layout: &Layout, fork_id: &str) -> VaultResult<()> {
    if fork_id == MAIN_STORE_ID {
        return Err(EngineError::CannotDeleteMain.into());
    }
    let dir = layout.instance_dir(fork_id);
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    let manifest_path = layout.manifest_path();
    let mut manifest = StoreManifest::load_or_default(&manifest_path)?;
    manifest.forks.retain(|f| f.fork_id != fork_id);
    manifest.save(&manifest_path)?;
    info!(fork_id, "deleted fork");
    Ok(())
}

/// Record a lightweight snapshot pointer in `store.json`.
pub fn create_snapshot(
    layout: &Layout,
    source_store_id: &str,
    source: &mut StoreInstance,
    timestamp: i64,
    now_ms: i64,
) -> VaultResult<SnapshotRecord> {
    let snapshot = SnapshotRecord {
        snapshot_id: format!("{source_store_id}@{timestamp}"),
        source_store_id: source_store_id.to_string(),
        timestamp,
        merkle_root: source.merkle.root().map(str::to_string),
        record_count: source.total_record_count()?,
        created_at: now_ms,
    };
    let manifest_path = layout.manifest_path();
    let mut manifest = StoreManifest::load_or_default(&manifest_path)?;
    manifest.snapshots.push(snapshot.clone());
    manifest.save(&manifest_path)?;
    Ok(snapshot)
}

/// `restoreSnapshot(snap_id)`: syntactic sugar for
/// `createForkAtTime(snap.source_store_id, snap.timestamp)`.
pub fn restore_snapshot(
    layout: &Layout,
    source: &mut StoreInstance,
    snapshot_id: &str,
    fork_id: &str,
    config: &VaultConfig,
    now_ms: i64,
) -> VaultResult<(StoreInstance, ForkMetadata)> {
    let manifest = StoreManifest::load_or_default(&layout.manifest_path())?;
    let snapshot = manifest
        .snapshots
        .iter()
        .find(|s| s.snapshot_id == snapshot_id)
        .ok_or_else(|| EngineError::UnknownSnapshot { snapshot_id: snapshot_id.to_string() })?
        .clone();
    create_fork_at_time(layout, source, fork_id, snapshot.timestamp, None, None, config, now_ms)
}

fn write_fork_metadata(layout: &Layout, metadata: &ForkMetadata) -> VaultResult<()> {
    let bytes = serde_json::to_vec_pretty(metadata).expect("fork metadata serializes");
    fs::write(layout.fork_metadata_path(&metadata.fork_id), bytes)?;
    Ok(())
}

fn register_fork_summary(
    layout: &Layout,
    fork_id: &str,
    source_store_id: &str,
    name: Option<String>,
    now_ms: i64,
) -> VaultResult<()> {
    let manifest_path = layout.manifest_path();
    let mut manifest = StoreManifest::load_or_default(&manifest_path)?;
    manifest.forks.push(ForkSummary {
        fork_id: fork_id.to_string(),
        source_store_id: source_store_id.to_string(),
        name,
        created_at: now_ms,
    });
    manifest.save(&manifest_path)?;
    Ok(())
}
