//! Embedding-backed search over the page corpus.
//!
//! [`RetrievalService`] ties an [`Embedder`] to a [`VectorIndex`]: documents go
//! in through [`index_documents`](RetrievalService::index_documents), questions
//! come out as ranked page ids through [`search`](RetrievalService::search).

use tracing::{debug, info, warn};

use crate::document::{DocId, Document};
use crate::embeddings::{Embedder, EmbeddingVector};
use crate::error::{RagError, Result};
use crate::vector_index::{Neighbor, VectorIndex};

/// Pages returned per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// Outcome of [`RetrievalService::index_documents`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSummary {
    /// Ids now searchable, in index order.
    pub indexed: Vec<DocId>,
    /// Ids dropped because their text was empty or whitespace.
    pub blank: Vec<DocId>,
    /// Ids dropped because the embedder rejected their text.
    pub unembeddable: Vec<DocId>,
}

pub struct RetrievalService<E> {
    embedder: E,
    index: VectorIndex,
}

impl<E: Embedder> RetrievalService<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            index: VectorIndex::new(),
        }
    }

    /// Embed `documents` and (re)build the index from them.
    ///
    /// Blank documents are skipped. The texts go through
    /// [`Embedder::embed_batch`]; if the batch fails, each text is retried on
    /// its own so that one bad document only costs itself.
    ///
    /// # Errors
    /// [`RagError::NoIndexableContent`] when nothing is left to index. Any
    /// error from [`VectorIndex::build`] is passed through.
    pub fn index_documents(&mut self, documents: &[Document]) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();

        let candidates: Vec<&Document> = documents
            .iter()
            .filter(|doc| {
                if doc.is_blank() {
                    warn!("Skipping page {} due to empty content.", doc.id);
                    summary.blank.push(doc.id.clone());
                    false
                } else {
                    true
                }
            })
            .collect();

        if candidates.is_empty() {
            warn!("No valid texts to index.");
            return Err(RagError::NoIndexableContent);
        }

        let (vectors, ids) = self.embed_documents(&candidates, &mut summary.unembeddable)?;
        if ids.is_empty() {
            return Err(RagError::NoIndexableContent);
        }

        self.index.build(vectors, ids.clone())?;
        summary.indexed = ids;
        Ok(summary)
    }

    fn embed_documents(
        &self,
        documents: &[&Document],
        failed: &mut Vec<DocId>,
    ) -> Result<(Vec<EmbeddingVector>, Vec<DocId>)> {
        let texts: Vec<&str> = documents.iter().map(|doc| doc.text.as_str()).collect();

        match self.embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == documents.len() => {
                let ids = documents.iter().map(|doc| doc.id.clone()).collect();
                Ok((vectors, ids))
            }
            Ok(vectors) => Err(RagError::DimensionMismatch {
                expected: documents.len(),
                found: vectors.len(),
            }),
            Err(e) => {
                warn!("Batch embedding failed ({e}), embedding pages one at a time");
                let mut vectors = Vec::with_capacity(documents.len());
                let mut ids = Vec::with_capacity(documents.len());
                for doc in documents {
                    match self.embedder.embed(&doc.text) {
                        Ok(vector) => {
                            vectors.push(vector);
                            ids.push(doc.id.clone());
                        }
                        Err(e) => {
                            warn!("Failed to embed page {}: {e}", doc.id);
                            failed.push(doc.id.clone());
                        }
                    }
                }
                Ok((vectors, ids))
            }
        }
    }

    /// The `top_k` page ids most similar to `query`, best first.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<DocId>> {
        let ids = self
            .search_with_distances(query, top_k)?
            .into_iter()
            .map(|n| n.id)
            .collect::<Vec<_>>();
        info!("Related Page IDs: {:?}", ids);
        Ok(ids)
    }

    pub fn search_with_distances(&self, query: &str, top_k: usize) -> Result<Vec<Neighbor>> {
        if !self.index.is_built() {
            return Err(RagError::IndexNotBuilt);
        }
        let vector = self.embedder.embed(query)?;
        let neighbors = self.index.search_with_distances(&vector, top_k)?;
        debug!("Neighbors for {:?}: {:?}", query, neighbors);
        Ok(neighbors)
    }

    /// `true` once an index has been built.
    pub fn is_ready(&self) -> bool {
        self.index.is_built()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}
