//! # Chatbot
//!
//! [`ConfluenceChatbot`] runs the whole question-answering flow:
//!
//! 1. [`index_pages`](ConfluenceChatbot::index_pages) fetches the configured
//!    pages once and builds the vector index. Pages that fail to load are
//!    logged and left out; the rest are still indexed.
//! 2. [`chat`](ConfluenceChatbot::chat) embeds the question, picks the closest
//!    pages, assembles the bounded context, and asks the language model.
//!
//! The bot is generic over its three collaborators so tests can swap in
//! in-memory fakes for the embedder, the document store and the model.

use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::confluence::DocumentStore;
use crate::context::{ContextAssembler, RetrievedContext};
use crate::document::{DocId, Document};
use crate::embeddings::Embedder;
use crate::error::{FetchError, Result};
use crate::llm::LanguageModel;
use crate::retrieval::{DEFAULT_TOP_K, RetrievalService};

/// What happened to each requested page during indexing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    pub indexed: Vec<DocId>,
    /// Fetched, but empty or whitespace-only.
    pub blank: Vec<DocId>,
    /// Fetched, but the embedder failed on the text.
    pub unembeddable: Vec<DocId>,
    pub fetch_failures: Vec<FetchError>,
}

impl IndexReport {
    /// Number of requested pages that did not make it into the index.
    pub fn skipped(&self) -> usize {
        self.blank.len() + self.unembeddable.len() + self.fetch_failures.len()
    }
}

/// An answer together with the context it was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub context: RetrievedContext,
}

/// The single prompt sent to the language model.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!("User Query: {query}\nContext: {context}")
}

pub struct ConfluenceChatbot<E, S, L> {
    retrieval: RetrievalService<E>,
    store: S,
    llm: L,
    assembler: ContextAssembler,
    top_k: usize,
}

impl<E, S, L> ConfluenceChatbot<E, S, L>
where
    E: Embedder,
    S: DocumentStore,
    L: LanguageModel,
{
    pub fn new(embedder: E, store: S, llm: L) -> Self {
        Self {
            retrieval: RetrievalService::new(embedder),
            store,
            llm,
            assembler: ContextAssembler::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Fetch, embed and index `page_ids`.
    pub async fn index_pages(&mut self, page_ids: &[DocId]) -> Result<IndexReport> {
        self.index_pages_with_progress(page_ids, &ProgressBar::hidden())
            .await
    }

    /// [`index_pages`](Self::index_pages), ticking `progress` once per fetched page.
    ///
    /// # Errors
    /// [`RagError::NoIndexableContent`](crate::RagError::NoIndexableContent)
    /// if no page could be fetched with usable content.
    pub async fn index_pages_with_progress(
        &mut self,
        page_ids: &[DocId],
        progress: &ProgressBar,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut documents = Vec::with_capacity(page_ids.len());

        progress.set_length(page_ids.len() as u64);
        for id in page_ids {
            progress.set_message(format!("page {id}"));
            match self.store.fetch_document(id).await {
                Ok(text) => {
                    if !text.trim().is_empty() {
                        info!("Indexing page {id} ({} chars)", text.chars().count());
                    }
                    documents.push(Document::new(id.clone(), text));
                }
                Err(e) => {
                    warn!("Failed to fetch page {id}: {e}");
                    report.fetch_failures.push(e);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        let summary = self.retrieval.index_documents(&documents)?;
        report.indexed = summary.indexed;
        report.blank = summary.blank;
        report.unembeddable = summary.unembeddable;

        info!(
            "Indexed {} of {} pages ({} skipped)",
            report.indexed.len(),
            page_ids.len(),
            report.skipped()
        );
        Ok(report)
    }

    /// Answer `query` from the indexed pages.
    ///
    /// # Errors
    /// - [`RagError::IndexNotBuilt`](crate::RagError::IndexNotBuilt) before indexing.
    /// - [`RagError::UpstreamUnavailable`](crate::RagError::UpstreamUnavailable)
    ///   when the language model call fails.
    pub async fn chat(&self, query: &str) -> Result<String> {
        Ok(self.chat_with_context(query).await?.answer)
    }

    /// Like [`chat`](Self::chat), also returning the context that was used.
    pub async fn chat_with_context(&self, query: &str) -> Result<ChatReply> {
        let related_pages = self.retrieval.search(query, self.top_k)?;
        let context = self.assembler.assemble(&related_pages, &self.store).await;

        let prompt = build_prompt(query, context.as_str());
        let answer = self.llm.generate(&prompt).await?;

        Ok(ChatReply { answer, context })
    }

    pub fn is_ready(&self) -> bool {
        self.retrieval.is_ready()
    }
}
