/// Storage-layer errors: WAL, segments, and the latest-version index.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("store id mismatch: expected {expected}, found {found}")]
    StoreIdMismatch { expected: String, found: String },

    #[error("bad magic: expected one of {expected:?}, found {found:?}")]
    BadMagic { expected: Vec<[u8; 4]>, found: [u8; 4] },

    #[error("unsupported format version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("record corrupt: {detail}")]
    RecordCorrupt { detail: String },

    #[error("WAL truncated at byte {offset}: {detail}")]
    WalTruncated { offset: u64, detail: String },

    #[error("record not found: {id}")]
    IdNotFound { id: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
