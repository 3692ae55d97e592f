/// Vector (HNSW) index errors.
#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unsupported snapshot version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("invalid hnsw parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}
