/// Merkle-tree errors.
#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    #[error("merkle tree corrupt: stored root {stored} does not match rebuilt root {rebuilt}")]
    Corrupt { stored: String, rebuilt: String },

    #[error("leaf index {index} out of range (len {len})")]
    LeafOutOfRange { index: usize, len: usize },

    #[error("unsupported snapshot version: {version}")]
    UnsupportedVersion { version: u32 },
}
