//! Error catalog for the vaultmem memory store.
//!
//! Each subsystem gets its own `thiserror` enum; [`VaultError`] wraps all of
//! them into the single error type the public API surfaces, matching the
//! catalog in spec §7 (`CONFIG_INVALID`, `STORE_ID_MISMATCH`, ...).

mod engine_error;
mod merkle_error;
mod storage_error;
mod text_error;
mod vector_error;

pub use engine_error::EngineError;
pub use merkle_error::MerkleError;
pub use storage_error::StorageError;
pub use text_error::TextIndexError;
pub use vector_error::VectorIndexError;

/// The top-level error type surfaced at the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// A configuration value violated a §6 constraint.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Vector(#[from] VectorIndexError),

    #[error(transparent)]
    Text(#[from] TextIndexError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// `getMemory`/`getRelationship` for an unknown id.
    #[error("record not found: {0}")]
    IdNotFound(String),

    /// Underlying storage I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout vaultmem.
pub type VaultResult<T> = Result<T, VaultError>;
