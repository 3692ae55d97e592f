use serde::{Deserialize, Serialize};

use crate::constants::{MAX_IMPORTANCE, MIN_IMPORTANCE};

use super::hash::{
    canonical_bool, canonical_field, canonical_opt_str, canonical_tags, HashAlgorithm,
};

/// Cadence under which a memory is considered "due" (spec §4.H read path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceType {
    Daily,
    Weekly,
    Monthly,
    DayOfWeek,
    DayOfMonth,
}

impl CadenceType {
    /// The exact lowercase string used both in JSON and in canonical
    /// content-hash serialization.
    pub fn as_str(self) -> &'static str {
        match self {
            CadenceType::Daily => "daily",
            CadenceType::Weekly => "weekly",
            CadenceType::Monthly => "monthly",
            CadenceType::DayOfWeek => "day_of_week",
            CadenceType::DayOfMonth => "day_of_month",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(CadenceType::Daily),
            "weekly" => Some(CadenceType::Weekly),
            "monthly" => Some(CadenceType::Monthly),
            "day_of_week" => Some(CadenceType::DayOfWeek),
            "day_of_month" => Some(CadenceType::DayOfMonth),
            _ => None,
        }
    }
}

/// A versioned text memory: the primary record kind in vaultmem.
///
/// `content_hash` covers only the content fields listed in spec §3 —
/// `timestamp`, `prev_hash`, `embedding`, and `content_hash` itself are
/// explicitly excluded so identical content produces the same hash
/// regardless of when or in what chain position it was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub memory_id: String,
    pub version: u32,
    pub store_id: String,
    pub timestamp: i64,
    pub category: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    pub tags: Vec<String>,
    pub importance: i32,
    pub cadence_type: Option<CadenceType>,
    pub cadence_value: Option<String>,
    pub context: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub deleted: bool,
    pub prev_hash: Option<String>,
    pub content_hash: String,
}

impl Memory {
    /// Clamp importance into the `1..=10` range (spec §3, §4.H step 1).
    pub fn clamp_importance(importance: i32) -> i32 {
        importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE)
    }

    /// Sort and dedup a tag set into its canonical stored form.
    pub fn normalize_tags(mut tags: Vec<String>) -> Vec<String> {
        tags.sort();
        tags.dedup();
        tags
    }

    /// Build the canonical content string used by [`Self::compute_content_hash`].
    ///
    /// Fields are emitted in lexicographic order by name, each as
    /// `name:value|`, per spec §3. This function is infallible and pure —
    /// callers are responsible for normalizing `tags`/`importance` first if
    /// the resulting hash must reflect the stored (normalized) form.
    pub fn canonical_content(&self) -> String {
        let mut s = String::new();
        s.push_str(&canonical_field(
            "cadence_type",
            &self
                .cadence_type
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "null".to_string()),
        ));
        s.push_str(&canonical_field(
            "cadence_value",
            &canonical_opt_str(self.cadence_value.as_deref()),
        ));
        s.push_str(&canonical_field("category", &self.category));
        s.push_str(&canonical_field("content", &self.content));
        s.push_str(&canonical_field(
            "context",
            &canonical_opt_str(self.context.as_deref()),
        ));
        s.push_str(&canonical_field("deleted", canonical_bool(self.deleted)));
        s.push_str(&canonical_field("importance", &self.importance.to_string()));
        s.push_str(&canonical_field("memory_id", &self.memory_id));
        s.push_str(&canonical_field("store_id", &self.store_id));
        s.push_str(&canonical_field("tags", &canonical_tags(&self.tags)));
        s.push_str(&canonical_field("type", &self.memory_type));
        s.push_str(&canonical_field("version", &self.version.to_string()));
        s
    }

    /// Compute the content hash per the configured algorithm (spec §3
    /// invariant HASH).
    pub fn compute_content_hash(&self, algo: HashAlgorithm) -> String {
        algo.hash_hex(self.canonical_content().as_bytes())
    }

    /// Verify `self.content_hash` against a freshly recomputed hash.
    /// Used on rebuild/verify paths (spec §4.A framing note).
    pub fn verify_content_hash(&self, algo: HashAlgorithm) -> bool {
        self.compute_content_hash(algo) == self.content_hash
    }

    /// Construct version 1 of a memory: clamps importance, sorts tags,
    /// stamps `version = 1`, `prev_hash = None`, and computes the content
    /// hash (spec §4.H step 1).
    #[allow(clippy::too_many_arguments)]
    pub fn new_v1(
        memory_id: String,
        store_id: String,
        timestamp: i64,
        category: String,
        memory_type: String,
        content: String,
        tags: Vec<String>,
        importance: i32,
        cadence_type: Option<CadenceType>,
        cadence_value: Option<String>,
        context: Option<String>,
        embedding: Option<Vec<f32>>,
        algo: HashAlgorithm,
    ) -> Self {
        let mut m = Memory {
            memory_id,
            version: 1,
            store_id,
            timestamp,
            category,
            memory_type,
            content,
            tags: Self::normalize_tags(tags),
            importance: Self::clamp_importance(importance),
            cadence_type,
            cadence_value,
            context,
            embedding,
            deleted: false,
            prev_hash: None,
            content_hash: String::new(),
        };
        m.content_hash = m.compute_content_hash(algo);
        m
    }

    /// Construct the next version in this memory's chain. `prev_hash` is set
    /// to `self.content_hash`; the caller supplies the updated fields (embed
    /// policy — preserve/re-embed/clear — is the coordinator's
    /// responsibility, spec §4.H step 1).
    #[allow(clippy::too_many_arguments)]
    pub fn next_version(
        &self,
        timestamp: i64,
        category: String,
        memory_type: String,
        content: String,
        tags: Vec<String>,
        importance: i32,
        cadence_type: Option<CadenceType>,
        cadence_value: Option<String>,
        context: Option<String>,
        embedding: Option<Vec<f32>>,
        deleted: bool,
        algo: HashAlgorithm,
    ) -> Self {
        let mut m = Memory {
            memory_id: self.memory_id.clone(),
            version: self.version + 1,
            store_id: self.store_id.clone(),
            timestamp,
            category,
            memory_type,
            content,
            tags: Self::normalize_tags(tags),
            importance: Self::clamp_importance(importance),
            cadence_type,
            cadence_value,
            context,
            embedding,
            deleted,
            prev_hash: Some(self.content_hash.clone()),
            content_hash: String::new(),
        };
        m.content_hash = m.compute_content_hash(algo);
        m
    }

    /// Soft-delete: a new version with `deleted = true` and unchanged
    /// content otherwise (spec §3 "Version chain").
    pub fn next_deleted_version(&self, timestamp: i64, algo: HashAlgorithm) -> Self {
        self.next_version(
            timestamp,
            self.category.clone(),
            self.memory_type.clone(),
            self.content.clone(),
            self.tags.clone(),
            self.importance,
            self.cadence_type,
            self.cadence_value.clone(),
            self.context.clone(),
            None,
            true,
            algo,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Memory {
        Memory::new_v1(
            "m1".into(),
            "main".into(),
            1000,
            "people".into(),
            "person".into(),
            "Alice".into(),
            vec!["work".into(), "friend".into()],
            8,
            None,
            None,
            None,
            None,
            HashAlgorithm::Sha256,
        )
    }

    #[test]
    fn tags_are_sorted_on_construction() {
        let m = sample();
        assert_eq!(m.tags, vec!["friend".to_string(), "work".to_string()]);
    }

    #[test]
    fn importance_is_clamped() {
        assert_eq!(Memory::clamp_importance(99), 10);
        assert_eq!(Memory::clamp_importance(-5), 1);
        assert_eq!(Memory::clamp_importance(5), 5);
    }

    #[test]
    fn content_hash_is_64_hex_chars_for_sha256() {
        let m = sample();
        assert_eq!(m.content_hash.len(), 64);
        assert!(m.content_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn content_hash_ignores_timestamp_prev_hash_and_embedding() {
        let mut a = sample();
        let mut b = sample();
        b.timestamp = 999_999;
        b.prev_hash = Some("deadbeef".into());
        b.embedding = Some(vec![1.0, 2.0, 3.0]);
        a.content_hash = a.compute_content_hash(HashAlgorithm::Sha256);
        b.content_hash = b.compute_content_hash(HashAlgorithm::Sha256);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn update_preserves_chain() {
        let v1 = sample();
        let v2 = v1.next_version(
            2000,
            v1.category.clone(),
            v1.memory_type.clone(),
            "Bob".into(),
            v1.tags.clone(),
            v1.importance,
            v1.cadence_type,
            v1.cadence_value.clone(),
            v1.context.clone(),
            None,
            false,
            HashAlgorithm::Sha256,
        );
        assert_eq!(v2.version, 2);
        assert_eq!(v2.prev_hash.as_deref(), Some(v1.content_hash.as_str()));
        assert_ne!(v2.content_hash, v1.content_hash);
    }

    #[test]
    fn verify_content_hash_detects_tampering() {
        let mut m = sample();
        assert!(m.verify_content_hash(HashAlgorithm::Sha256));
        m.content = "Tampered".into();
        assert!(!m.verify_content_hash(HashAlgorithm::Sha256));
    }
}
