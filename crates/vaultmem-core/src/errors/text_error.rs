/// BM25 text index errors.
#[derive(Debug, thiserror::Error)]
pub enum TextIndexError {
    #[error("unsupported snapshot version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("invalid bm25 parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}
