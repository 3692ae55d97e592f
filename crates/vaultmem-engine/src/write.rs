//! Write path (spec §4.H): `addMemory` / `updateMemory` / `addRelationship` /
//! `removeRelationship`, plus a soft-delete convenience for memories.

use vaultmem_core::errors::{VaultError, VaultResult};
use vaultmem_core::record::{CadenceType, HashAlgorithm, Memory, Record, Relationship, RelationshipType};
use vaultmem_core::traits::Embedder;
use vaultmem_storage::latest_index::IndexKind;

use crate::instance::StoreInstance;
use crate::layout::Layout;

/// Fields accepted by `addMemory`/`updateMemory`. `embedding` is never set
/// directly by callers — it is always derived from `content` via the
/// configured [`Embedder`], matching spec §1's "embedding generation is an
/// opaque injected function" scoping.
#[derive(Debug, Clone)]
pub struct MemoryInput {
    pub category: String,
    pub memory_type: String,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: i32,
    pub cadence_type: Option<CadenceType>,
    pub cadence_value: Option<String>,
    pub context: Option<String>,
}

/// Build and append version 1 of a new memory (spec §4.H write path step 1-3).
pub fn add_memory(
    instance: &mut StoreInstance,
    layout: &Layout,
    memory_id: String,
    store_id: String,
    input: MemoryInput,
    embedder: Option<&dyn Embedder>,
    now_ms: i64,
    algo: HashAlgorithm,
) -> VaultResult<Memory> {
    let embedding = match embedder {
        Some(e) => Some(e.embed(&input.content)?),
        None => None,
    };
    let memory = Memory::new_v1(
        memory_id,
        store_id,
        now_ms,
        input.category,
        input.memory_type,
        input.content,
        input.tags,
        input.importance,
        input.cadence_type,
        input.cadence_value,
        input.context,
        embedding,
        algo,
    );
    instance.append_and_fan_out(layout, &Record::Memory(memory.clone()), now_ms)?;
    Ok(memory)
}

/// Build and append the next version of an existing memory. Embedding
/// policy (spec §4.H step 1, preserved verbatim including the "clear on
/// content change without an embedder" edge case, spec §9): preserve the
/// prior embedding if `content` is unchanged; re-embed if an embedder is
/// configured and `content` changed; otherwise clear it.
pub fn update_memory(
    instance: &mut StoreInstance,
    layout: &Layout,
    memory_id: &str,
    input: MemoryInput,
    embedder: Option<&dyn Embedder>,
    now_ms: i64,
    algo: HashAlgorithm,
) -> VaultResult<Memory> {
    let current = instance
        .get_record(IndexKind::Memory, memory_id)?
        .and_then(|r| r.as_memory().cloned())
        .ok_or_else(|| VaultError::IdNotFound(memory_id.to_string()))?;

    let embedding = if input.content == current.content {
        current.embedding.clone()
    } else if let Some(e) = embedder {
        Some(e.embed(&input.content)?)
    } else {
        None
    };

    let next = current.next_version(
        now_ms,
        input.category,
        input.memory_type,
        input.content,
        input.tags,
        input.importance,
        input.cadence_type,
        input.cadence_value,
        input.context,
        embedding,
        false,
        algo,
    );
    instance.append_and_fan_out(layout, &Record::Memory(next.clone()), now_ms)?;
    Ok(next)
}

/// Soft-delete a memory: append a new version with `deleted = true` and
/// content otherwise unchanged (spec §3 "Version chain").
pub fn delete_memory(
    instance: &mut StoreInstance,
    layout: &Layout,
    memory_id: &str,
    now_ms: i64,
    algo: HashAlgorithm,
) -> VaultResult<Memory> {
    let current = instance
        .get_record(IndexKind::Memory, memory_id)?
        .and_then(|r| r.as_memory().cloned())
        .ok_or_else(|| VaultError::IdNotFound(memory_id.to_string()))?;
    let next = current.next_deleted_version(now_ms, algo);
    instance.append_and_fan_out(layout, &Record::Memory(next.clone()), now_ms)?;
    Ok(next)
}

/// Build and append version 1 of a new relationship.
#[allow(clippy::too_many_arguments)]
pub fn add_relationship(
    instance: &mut StoreInstance,
    layout: &Layout,
    relationship_id: String,
    store_id: String,
    memory_id: String,
    related_memory_id: String,
    relationship_type: RelationshipType,
    now_ms: i64,
    algo: HashAlgorithm,
) -> VaultResult<Relationship> {
    let relationship = Relationship::new_v1(
        relationship_id,
        store_id,
        now_ms,
        memory_id,
        related_memory_id,
        relationship_type,
        algo,
    );
    instance.append_and_fan_out(layout, &Record::Relationship(relationship.clone()), now_ms)?;
    Ok(relationship)
}

/// Soft-delete a relationship.
pub fn remove_relationship(
    instance: &mut StoreInstance,
    layout: &Layout,
    relationship_id: &str,
    now_ms: i64,
    algo: HashAlgorithm,
) -> VaultResult<Relationship> {
    let current = instance
        .get_record(IndexKind::Relationship, relationship_id)?
        .and_then(|r| r.as_relationship().cloned())
        .ok_or_else(|| VaultError::IdNotFound(relationship_id.to_string()))?;
    let next = current.next_deleted_version(now_ms, algo);
    instance.append_and_fan_out(layout, &Record::Relationship(next.clone()), now_ms)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultmem_core::config::VaultConfig;

    use crate::layout::Layout;

    fn sample_input(content: &str) -> MemoryInput {
        MemoryInput {
            category: "note".to_string(),
            memory_type: "fact".to_string(),
            content: content.to_string(),
            tags: vec![],
            importance: 5,
            cadence_type: None,
            cadence_value: None,
            context: None,
        }
    }

    fn open(dir: &std::path::Path) -> (StoreInstance, Layout) {
        let config = VaultConfig::default();
        let layout = Layout::new(dir.to_path_buf());
        let instance = StoreInstance::open(&layout, "main", &config).unwrap();
        (instance, layout)
    }

    #[test]
    fn update_memory_unknown_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instance, layout) = open(dir.path());
        let err = update_memory(&mut instance, &layout, "missing", sample_input("x"), None, 1, HashAlgorithm::Sha256);
        assert!(matches!(err, Err(VaultError::IdNotFound(_))));
    }

    #[test]
    fn add_then_update_bumps_version_and_links_prev_hash() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instance, layout) = open(dir.path());
        let v1 =
            add_memory(&mut instance, &layout, "m1".to_string(), "main".to_string(), sample_input("a"), None, 1, HashAlgorithm::Sha256)
                .unwrap();
        let v2 = update_memory(&mut instance, &layout, "m1", sample_input("b"), None, 2, HashAlgorithm::Sha256).unwrap();

        assert_eq!(v2.version, 2);
        assert_eq!(v2.prev_hash.as_deref(), Some(v1.content_hash.as_str()));
    }

    #[test]
    fn delete_memory_sets_deleted_and_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instance, layout) = open(dir.path());
        add_memory(&mut instance, &layout, "m1".to_string(), "main".to_string(), sample_input("a"), None, 1, HashAlgorithm::Sha256)
            .unwrap();
        let deleted = delete_memory(&mut instance, &layout, "m1", 2, HashAlgorithm::Sha256).unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.content, "a");
        assert_eq!(deleted.version, 2);
    }
}
