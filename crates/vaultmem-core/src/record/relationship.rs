use serde::{Deserialize, Serialize};

use super::hash::{canonical_bool, canonical_field, HashAlgorithm};

/// The kind of relation one memory bears to another (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    RelatedTo,
    Supersedes,
    Contradicts,
    Elaborates,
    References,
}

impl RelationshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::RelatedTo => "related_to",
            RelationshipType::Supersedes => "supersedes",
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::Elaborates => "elaborates",
            RelationshipType::References => "references",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "related_to" => Some(RelationshipType::RelatedTo),
            "supersedes" => Some(RelationshipType::Supersedes),
            "contradicts" => Some(RelationshipType::Contradicts),
            "elaborates" => Some(RelationshipType::Elaborates),
            "references" => Some(RelationshipType::References),
            _ => None,
        }
    }
}

/// A directed edge between two memories, versioned the same way a [`super::Memory`]
/// is (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub relationship_id: String,
    pub version: u32,
    pub store_id: String,
    pub timestamp: i64,
    pub memory_id: String,
    pub related_memory_id: String,
    pub relationship_type: RelationshipType,
    pub deleted: bool,
    pub prev_hash: Option<String>,
    pub content_hash: String,
}

impl Relationship {
    /// Canonical content string in lexicographic field-name order (spec §3):
    /// `deleted, memory_id, related_memory_id, relationship_id,
    /// relationship_type, store_id, version`.
    pub fn canonical_content(&self) -> String {
        let mut s = String::new();
        s.push_str(&canonical_field("deleted", canonical_bool(self.deleted)));
        s.push_str(&canonical_field("memory_id", &self.memory_id));
        s.push_str(&canonical_field("related_memory_id", &self.related_memory_id));
        s.push_str(&canonical_field("relationship_id", &self.relationship_id));
        s.push_str(&canonical_field(
            "relationship_type",
            self.relationship_type.as_str(),
        ));
        s.push_str(&canonical_field("store_id", &self.store_id));
        s.push_str(&canonical_field("version", &self.version.to_string()));
        s
    }

    pub fn compute_content_hash(&self, algo: HashAlgorithm) -> String {
        algo.hash_hex(self.canonical_content().as_bytes())
    }

    pub fn verify_content_hash(&self, algo: HashAlgorithm) -> bool {
        self.compute_content_hash(algo) == self.content_hash
    }

    pub fn new_v1(
        relationship_id: String,
        store_id: String,
        timestamp: i64,
        memory_id: String,
        related_memory_id: String,
        relationship_type: RelationshipType,
        algo: HashAlgorithm,
    ) -> Self {
        let mut r = Relationship {
            relationship_id,
            version: 1,
            store_id,
            timestamp,
            memory_id,
            related_memory_id,
            relationship_type,
            deleted: false,
            prev_hash: None,
            content_hash: String::new(),
        };
        r.content_hash = r.compute_content_hash(algo);
        r
    }

    pub fn next_version(
        &self,
        timestamp: i64,
        relationship_type: RelationshipType,
        deleted: bool,
        algo: HashAlgorithm,
    ) -> Self {
        let mut r = Relationship {
            relationship_id: self.relationship_id.clone(),
            version: self.version + 1,
            store_id: self.store_id.clone(),
            timestamp,
            memory_id: self.memory_id.clone(),
            related_memory_id: self.related_memory_id.clone(),
            relationship_type,
            deleted,
            prev_hash: Some(self.content_hash.clone()),
            content_hash: String::new(),
        };
        r.content_hash = r.compute_content_hash(algo);
        r
    }

    pub fn next_deleted_version(&self, timestamp: i64, algo: HashAlgorithm) -> Self {
        self.next_version(timestamp, self.relationship_type, true, algo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_ignores_timestamp_and_prev_hash() {
        let mut a = Relationship::new_v1(
            "r1".into(),
            "main".into(),
            1000,
            "m1".into(),
            "m2".into(),
            RelationshipType::RelatedTo,
            HashAlgorithm::Sha256,
        );
        let mut b = a.clone();
        b.timestamp = 5000;
        b.prev_hash = Some("abcd".into());
        a.content_hash = a.compute_content_hash(HashAlgorithm::Sha256);
        b.content_hash = b.compute_content_hash(HashAlgorithm::Sha256);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn chain_links_via_prev_hash() {
        let v1 = Relationship::new_v1(
            "r1".into(),
            "main".into(),
            1000,
            "m1".into(),
            "m2".into(),
            RelationshipType::RelatedTo,
            HashAlgorithm::Sha256,
        );
        let v2 = v1.next_deleted_version(2000, HashAlgorithm::Sha256);
        assert_eq!(v2.version, 2);
        assert!(v2.deleted);
        assert_eq!(v2.prev_hash.as_deref(), Some(v1.content_hash.as_str()));
    }
}
