//! In-memory stand-ins for the embedder, the document store and the model.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::confluence::DocumentStore;
use crate::document::DocId;
use crate::embeddings::{Embedder, EmbeddingVector};
use crate::error::{FetchError, RagError, Result};
use crate::llm::LanguageModel;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: 512 }
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut values = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            values[(hasher.finish() as usize) % self.dimension] += 1.0;
        }
        Ok(EmbeddingVector::normalized(values))
    }
}

/// Fails on any text containing `poison`, delegates otherwise.
#[derive(Debug, Clone)]
pub struct FlakyEmbedder {
    inner: HashingEmbedder,
    poison: String,
}

impl FlakyEmbedder {
    pub fn failing_on(poison: &str) -> Self {
        Self {
            inner: HashingEmbedder::default(),
            poison: poison.to_string(),
        }
    }
}

impl Embedder for FlakyEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        if text.contains(&self.poison) {
            return Err(RagError::EmbeddingFailed(format!("refusing {text:?}")));
        }
        self.inner.embed(text)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    pages: HashMap<DocId, String>,
    transient: HashSet<DocId>,
}

/// Page store backed by a map. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new<I, K, T>(pages: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<DocId>,
        T: Into<String>,
    {
        let pages = pages
            .into_iter()
            .map(|(id, text)| (id.into(), text.into()))
            .collect();
        Self {
            state: Arc::new(Mutex::new(StoreState {
                pages,
                transient: HashSet::new(),
            })),
        }
    }

    pub fn with_transient_failure(self, id: impl Into<DocId>) -> Self {
        self.fail_transiently(id);
        self
    }

    /// Make every later fetch of `id` fail with a transient error.
    pub fn fail_transiently(&self, id: impl Into<DocId>) {
        self.state.lock().unwrap().transient.insert(id.into());
    }
}

impl DocumentStore for MemoryStore {
    async fn fetch_document(&self, id: &DocId) -> std::result::Result<String, FetchError> {
        let state = self.state.lock().unwrap();
        if state.transient.contains(id) {
            return Err(FetchError::transient(id, "connection reset by peer"));
        }
        state
            .pages
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.clone()))
    }
}

/// Model with a fixed outcome that records every prompt it sees.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    outcome: std::result::Result<String, String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn answering(answer: &str) -> Self {
        Self {
            outcome: Ok(answer.to_string()),
            prompts: Arc::default(),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.outcome
            .clone()
            .map_err(RagError::UpstreamUnavailable)
    }
}
