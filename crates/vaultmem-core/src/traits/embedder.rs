use crate::errors::VaultResult;

/// Converts memory content into a dense vector for the HNSW index.
///
/// vaultmem never runs an embedding model itself — callers inject an
/// implementation of this trait (backed by whatever provider they choose)
/// at store-open time. A store opened without an `Embedder` still accepts
/// writes; content-change updates simply clear the stale embedding instead
/// of re-embedding (spec §9).
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text. The returned vector's length must equal
    /// the store's configured `dimensions`.
    fn embed(&self, text: &str) -> VaultResult<Vec<f32>>;

    /// Embed a batch of texts, preserving order. The default implementation
    /// calls [`Self::embed`] once per item; providers with a native batch
    /// API should override this.
    fn embed_batch(&self, texts: &[&str]) -> VaultResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The dimensionality this embedder produces, if known up front.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}
