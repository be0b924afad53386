//! # VectorIndex
//!
//! Exact nearest-neighbour index over [`EmbeddingVector`]s.
//!
//! Every query is compared against every stored vector, so results are exact
//! and ties are broken by insertion order (the lower slot wins). The corpus is
//! a fixed list of pages, tens to low thousands of entries, which keeps the
//! scan cheap.
//!
//! ## Quick Example
//! ```
//! use pagechat::document::DocId;
//! use pagechat::embeddings::EmbeddingVector;
//! use pagechat::vector_index::VectorIndex;
//!
//! # fn main() -> Result<(), pagechat::RagError> {
//! let mut index = VectorIndex::new();
//! index.build(
//!     vec![
//!         EmbeddingVector::normalized(vec![1.0, 0.0]),
//!         EmbeddingVector::normalized(vec![0.0, 1.0]),
//!     ],
//!     vec![DocId::from(1u64), DocId::from(2u64)],
//! )?;
//! let hits = index.search(&EmbeddingVector::normalized(vec![0.1, 0.9]), 1)?;
//! assert_eq!(hits, vec![DocId::from(2u64)]);
//! # Ok(()) }
//! ```

use crate::document::DocId;
use crate::embeddings::EmbeddingVector;
use crate::error::{RagError, Result};

/// A search hit together with its squared Euclidean distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: DocId,
    pub distance: f32,
}

/// Flat L2 index: slot `i` holds `vectors[i]` and `ids[i]`.
#[derive(Debug, Default)]
pub struct VectorIndex {
    vectors: Vec<EmbeddingVector>,
    ids: Vec<DocId>,
    dimension: usize,
    built: bool,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the index contents with `vectors`, keeping their order.
    ///
    /// All inputs are validated before anything is touched, so a failed build
    /// leaves the previous contents (if any) searchable.
    ///
    /// # Errors
    /// - [`RagError::DimensionMismatch`] if `vectors.len() != ids.len()` or
    ///   the vectors do not all share one length.
    /// - [`RagError::NoIndexableContent`] if there is nothing to store.
    pub fn build(&mut self, vectors: Vec<EmbeddingVector>, ids: Vec<DocId>) -> Result<()> {
        if vectors.len() != ids.len() {
            return Err(RagError::DimensionMismatch {
                expected: ids.len(),
                found: vectors.len(),
            });
        }
        let Some(first) = vectors.first() else {
            return Err(RagError::NoIndexableContent);
        };

        let dimension = first.dimension();
        if let Some(odd) = vectors.iter().find(|v| v.dimension() != dimension) {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                found: odd.dimension(),
            });
        }

        self.vectors = vectors;
        self.ids = ids;
        self.dimension = dimension;
        self.built = true;

        tracing::info!(
            "Indexed {} pages with corresponding embeddings.",
            self.ids.len()
        );
        Ok(())
    }

    /// Ids of the `k` stored vectors closest to `query`, nearest first.
    pub fn search(&self, query: &EmbeddingVector, k: usize) -> Result<Vec<DocId>> {
        Ok(self
            .search_with_distances(query, k)?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    /// Like [`search`](Self::search) but keeps the squared distances.
    pub fn search_with_distances(
        &self,
        query: &EmbeddingVector,
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        if !self.built {
            return Err(RagError::IndexNotBuilt);
        }
        if query.dimension() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                found: query.dimension(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(slot, v)| (slot, query.squared_distance(v)))
            .collect();
        // stable sort: equal distances keep slot order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(slot, distance)| Neighbor {
                id: self.ids[slot].clone(),
                distance,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Dimensionality of the stored vectors, `None` before the first build.
    pub fn dimension(&self) -> Option<usize> {
        self.built.then_some(self.dimension)
    }
}
