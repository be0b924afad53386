//! Error types for the retrieval pipeline.
//!
//! [`RagError`] covers everything that can abort an operation. Per-document
//! fetch problems are modelled separately as [`FetchError`] because they are
//! always recovered locally: the document is skipped and the batch continues.

use crate::document::DocId;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, RagError>;

/// Failures that abort the current operation.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Missing or invalid configuration (credentials, base urls). Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding model could not be downloaded or loaded.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Inference failed for a single text.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Vector lengths or vector/id counts disagree.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Nothing was left to index after filtering blank documents.
    #[error("no indexable content")]
    NoIndexableContent,

    /// `search` was called before a successful `build`.
    #[error("the vector index has not been built")]
    IndexNotBuilt,

    /// A corpus-wide request to the document store (such as a page search) failed.
    #[error("document store request failed: {0}")]
    DocumentStore(String),

    /// The LLM call failed (network, quota, malformed response).
    #[error("language model unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single document could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("page {0} not found")]
    NotFound(DocId),

    /// Network, authentication or response-shape problems.
    #[error("failed to fetch page {id}: {reason}")]
    Transient { id: DocId, reason: String },
}

impl FetchError {
    pub fn transient(id: &DocId, reason: impl ToString) -> Self {
        FetchError::Transient {
            id: id.clone(),
            reason: reason.to_string(),
        }
    }

    /// The page the failure is about.
    pub fn id(&self) -> &DocId {
        match self {
            FetchError::NotFound(id) | FetchError::Transient { id, .. } => id,
        }
    }
}
