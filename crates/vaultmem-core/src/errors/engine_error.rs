/// Store-coordinator errors: forking, PITR, recovery.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("fork already exists: {fork_id}")]
    ForkExists { fork_id: String },

    #[error("cannot delete the main store")]
    CannotDeleteMain,

    #[error("unknown store: {store_id}")]
    UnknownStore { store_id: String },

    #[error("unknown snapshot: {snapshot_id}")]
    UnknownSnapshot { snapshot_id: String },

    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),
}
