//! Binary record framing (spec §4.A).
//!
//! ```text
//! u32 total_length          // including itself
//! u8  record_type           // 0 = memory, 1 = relationship
//! u32 json_length
//! u8[json_length] json      // all non-binary fields except embedding, content_hash
//! u32 embedding_dim         // 0 if none; relationships always 0
//! f32[embedding_dim] embedding   // little-endian IEEE-754
//! u8[digest_len] content_hash    // raw digest, size tracks the configured algorithm
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use vaultmem_core::errors::StorageError;
use vaultmem_core::record::{hex_decode, hex_encode, Record, RecordKind};

/// Serialize a record into its frame bytes.
pub fn serialize_record(record: &Record, digest_len: usize) -> Result<Vec<u8>, StorageError> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| StorageError::RecordCorrupt { detail: e.to_string() })?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| StorageError::RecordCorrupt {
            detail: "record did not serialize to a JSON object".into(),
        })?;
    obj.remove("embedding");
    obj.remove("content_hash");
    let json_bytes = serde_json::to_vec(&value)
        .map_err(|e| StorageError::RecordCorrupt { detail: e.to_string() })?;

    let embedding: &[f32] = record.embedding().unwrap_or(&[]);
    let content_hash = hex_decode(record.content_hash()).ok_or_else(|| StorageError::RecordCorrupt {
        detail: "content_hash is not valid hex".into(),
    })?;
    if content_hash.len() != digest_len {
        return Err(StorageError::RecordCorrupt {
            detail: format!(
                "content_hash length {} does not match configured digest length {}",
                content_hash.len(),
                digest_len
            ),
        });
    }

    let mut body = Vec::with_capacity(9 + json_bytes.len() + 4 + embedding.len() * 4 + digest_len);
    body.write_u8(record.kind().as_u8())?;
    body.write_u32::<LittleEndian>(json_bytes.len() as u32)?;
    body.extend_from_slice(&json_bytes);
    body.write_u32::<LittleEndian>(embedding.len() as u32)?;
    for f in embedding {
        body.write_f32::<LittleEndian>(*f)?;
    }
    body.extend_from_slice(&content_hash);

    let total_length = (body.len() as u32) + 4;
    let mut frame = Vec::with_capacity(total_length as usize);
    frame.write_u32::<LittleEndian>(total_length)?;
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Deserialize one frame starting at `offset` in `buf`. Returns the record
/// and the number of bytes consumed (`total_length`).
///
/// Does not verify the trailing `content_hash` against a recomputed one;
/// callers on rebuild/verify paths should call `Memory::verify_content_hash`
/// / `Relationship::verify_content_hash` themselves.
pub fn deserialize_record(
    buf: &[u8],
    offset: usize,
    digest_len: usize,
) -> Result<(Record, usize), StorageError> {
    if offset + 4 > buf.len() {
        return Err(StorageError::WalTruncated {
            offset: offset as u64,
            detail: "not enough bytes for frame length".into(),
        });
    }
    let mut cursor = Cursor::new(&buf[offset..offset + 4]);
    let total_length = cursor.read_u32::<LittleEndian>()? as usize;
    if offset + total_length > buf.len() {
        return Err(StorageError::WalTruncated {
            offset: offset as u64,
            detail: format!(
                "frame claims {} bytes but only {} remain",
                total_length,
                buf.len() - offset
            ),
        });
    }

    let body = &buf[offset + 4..offset + total_length];
    let mut cursor = Cursor::new(body);
    let record_type = cursor.read_u8()?;
    let kind = RecordKind::from_u8(record_type).ok_or_else(|| StorageError::RecordCorrupt {
        detail: format!("unknown record_type {}", record_type),
    })?;
    let json_length = cursor.read_u32::<LittleEndian>()? as usize;
    let json_start = cursor.position() as usize;
    if json_start + json_length > body.len() {
        return Err(StorageError::WalTruncated {
            offset: offset as u64,
            detail: "json_length exceeds frame body".into(),
        });
    }
    let json_bytes = &body[json_start..json_start + json_length];
    let mut value: serde_json::Value = serde_json::from_slice(json_bytes)
        .map_err(|e| StorageError::RecordCorrupt { detail: e.to_string() })?;

    let mut cursor = Cursor::new(&body[json_start + json_length..]);
    let embedding_dim = cursor.read_u32::<LittleEndian>()? as usize;
    let mut embedding = Vec::with_capacity(embedding_dim);
    for _ in 0..embedding_dim {
        embedding.push(cursor.read_f32::<LittleEndian>()?);
    }
    let trailer_start = json_start + json_length + 4 + embedding_dim * 4;
    if trailer_start + digest_len != body.len() {
        return Err(StorageError::WalTruncated {
            offset: offset as u64,
            detail: "content_hash trailer length mismatch".into(),
        });
    }
    let content_hash_bytes = &body[trailer_start..trailer_start + digest_len];
    let content_hash = hex_encode(content_hash_bytes);

    let obj = value
        .as_object_mut()
        .ok_or_else(|| StorageError::RecordCorrupt {
            detail: "frame json is not an object".into(),
        })?;
    obj.insert(
        "embedding".to_string(),
        if embedding_dim > 0 {
            serde_json::to_value(&embedding).unwrap()
        } else {
            serde_json::Value::Null
        },
    );
    obj.insert(
        "content_hash".to_string(),
        serde_json::Value::String(content_hash),
    );
    obj.insert(
        "kind".to_string(),
        serde_json::Value::String(
            match kind {
                RecordKind::Memory => "memory",
                RecordKind::Relationship => "relationship",
            }
            .to_string(),
        ),
    );

    let record: Record = serde_json::from_value(value)
        .map_err(|e| StorageError::RecordCorrupt { detail: e.to_string() })?;
    Ok((record, total_length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultmem_core::record::{HashAlgorithm, Memory};

    #[test]
    fn round_trips_a_memory_with_embedding() {
        let m = Memory::new_v1(
            "m1".into(),
            "main".into(),
            1000,
            "people".into(),
            "person".into(),
            "Alice".into(),
            vec!["friend".into(), "work".into()],
            8,
            None,
            None,
            None,
            Some(vec![0.1, 0.2, 0.3]),
            HashAlgorithm::Sha256,
        );
        let record = Record::Memory(m.clone());
        let frame = serialize_record(&record, HashAlgorithm::Sha256.digest_len()).unwrap();
        let (decoded, consumed) =
            deserialize_record(&frame, 0, HashAlgorithm::Sha256.digest_len()).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded, record);
        if let Record::Memory(dm) = decoded {
            assert_eq!(dm.embedding, Some(vec![0.1, 0.2, 0.3]));
        } else {
            panic!("expected memory");
        }
    }

    #[test]
    fn round_trips_a_relationship_without_embedding() {
        use vaultmem_core::record::{Relationship, RelationshipType};
        let r = Relationship::new_v1(
            "r1".into(),
            "main".into(),
            1000,
            "m1".into(),
            "m2".into(),
            RelationshipType::RelatedTo,
            HashAlgorithm::Sha256,
        );
        let record = Record::Relationship(r);
        let frame = serialize_record(&record, HashAlgorithm::Sha256.digest_len()).unwrap();
        let (decoded, consumed) =
            deserialize_record(&frame, 0, HashAlgorithm::Sha256.digest_len()).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded, record);
    }

    #[test]
    fn multiple_frames_scan_sequentially() {
        let m1 = Memory::new_v1(
            "m1".into(), "main".into(), 1000, "c".into(), "t".into(), "A".into(),
            vec![], 5, None, None, None, None, HashAlgorithm::Sha256,
        );
        let m2 = Memory::new_v1(
            "m2".into(), "main".into(), 2000, "c".into(), "t".into(), "B".into(),
            vec![], 5, None, None, None, None, HashAlgorithm::Sha256,
        );
        let mut buf = Vec::new();
        buf.extend(serialize_record(&Record::Memory(m1.clone()), 32).unwrap());
        buf.extend(serialize_record(&Record::Memory(m2.clone()), 32).unwrap());

        let (first, n1) = deserialize_record(&buf, 0, 32).unwrap();
        let (second, _n2) = deserialize_record(&buf, n1, 32).unwrap();
        assert_eq!(first, Record::Memory(m1));
        assert_eq!(second, Record::Memory(m2));
    }

    #[test]
    fn truncated_trailing_frame_reports_wal_truncated() {
        let m1 = Memory::new_v1(
            "m1".into(), "main".into(), 1000, "c".into(), "t".into(), "A".into(),
            vec![], 5, None, None, None, None, HashAlgorithm::Sha256,
        );
        let full = serialize_record(&Record::Memory(m1), 32).unwrap();
        let truncated = &full[..full.len() - 5];
        let err = deserialize_record(truncated, 0, 32).unwrap_err();
        assert!(matches!(err, StorageError::WalTruncated { .. }));
    }
}
