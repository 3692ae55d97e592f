//! Read path (spec §4.H): `getMemory` / `getRelationship` / `listMemories` /
//! `getDueMemories`.

use chrono::{DateTime, Utc};

use vaultmem_core::errors::VaultResult;
use vaultmem_core::record::{Memory, Relationship};
use vaultmem_storage::latest_index::IndexKind;

use crate::cadence;
use crate::instance::StoreInstance;

pub fn get_memory(instance: &mut StoreInstance, memory_id: &str) -> VaultResult<Option<Memory>> {
    Ok(instance
        .get_record(IndexKind::Memory, memory_id)?
        .and_then(|r| r.as_memory().cloned()))
}

pub fn get_relationship(
    instance: &mut StoreInstance,
    relationship_id: &str,
) -> VaultResult<Option<Relationship>> {
    Ok(instance
        .get_record(IndexKind::Relationship, relationship_id)?
        .and_then(|r| r.as_relationship().cloned()))
}

/// Filters accepted by `listMemories` (spec §4.H read path).
#[derive(Debug, Clone, Default)]
pub struct ListMemoriesOptions {
    pub category: Option<String>,
    pub memory_type: Option<String>,
    pub include_deleted: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Iterate D in id order, skip to `offset` in that raw stream, then apply
/// category/type filters, stopping at `limit` (spec §4.H: "iterate D with
/// the includeDeleted filter, skip to offset, fetch each record, apply
/// category/type filters, stop at limit" — `offset` counts positions in the
/// raw D iteration, before category/type filtering, not in the filtered
/// result set).
pub fn list_memories(instance: &mut StoreInstance, options: &ListMemoriesOptions) -> VaultResult<Vec<Memory>> {
    let ids: Vec<String> = instance
        .latest
        .iterate(IndexKind::Memory, options.include_deleted)
        .into_iter()
        .map(|(id, _)| id.to_string())
        .collect();

    let mut out = Vec::new();
    for (position, id) in ids.into_iter().enumerate() {
        if position < options.offset {
            continue;
        }
        let Some(memory) = get_memory(instance, &id)? else { continue };
        if let Some(category) = &options.category {
            if &memory.category != category {
                continue;
            }
        }
        if let Some(memory_type) = &options.memory_type {
            if &memory.memory_type != memory_type {
                continue;
            }
        }
        out.push(memory);
        if options.limit > 0 && out.len() >= options.limit {
            break;
        }
    }
    Ok(out)
}

/// Live memories (per D) whose cadence makes them due as of `as_of` (spec
/// §4.H read path, §9 "cadence evaluation in UTC by default").
pub fn get_due_memories(instance: &mut StoreInstance, as_of: DateTime<Utc>) -> VaultResult<Vec<Memory>> {
    let ids: Vec<String> = instance
        .latest
        .iterate(IndexKind::Memory, false)
        .into_iter()
        .map(|(id, _)| id.to_string())
        .collect();

    let mut out = Vec::new();
    for id in ids {
        let Some(memory) = get_memory(instance, &id)? else { continue };
        let Some(cadence_type) = memory.cadence_type else { continue };
        if cadence::is_due(cadence_type, memory.cadence_value.as_deref(), as_of) {
            out.push(memory);
        }
    }
    Ok(out)
}
