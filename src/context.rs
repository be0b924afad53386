//! Context window assembly.
//!
//! Turns ranked page ids into the bounded text that accompanies a question.
//! Each page contributes at most [`PER_DOCUMENT_CHAR_LIMIT`] characters, pages
//! are joined with newlines, and the whole is cut at [`CONTEXT_CHAR_LIMIT`]
//! characters with [`TRUNCATION_MARKER`] appended when anything was cut.
//! Limits count Unicode scalar values, not bytes.
//!
//! Pages that fail to load are skipped and recorded in
//! [`RetrievedContext::skipped`]. A page that loads empty still takes its
//! place in the joined text.

use tracing::warn;

use crate::confluence::DocumentStore;
use crate::config::RetrievalSettings;
use crate::document::DocId;
use crate::error::FetchError;

pub const PER_DOCUMENT_CHAR_LIMIT: usize = 1000;
pub const CONTEXT_CHAR_LIMIT: usize = 6000;
pub const TRUNCATION_MARKER: &str = "...\n[Content truncated]";

/// One page's contribution, already cut to the per-page limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub id: DocId,
    pub text: String,
}

/// A page that could not be fetched for this question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub id: DocId,
    pub reason: FetchError,
}

/// The context handed to the language model for one question.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetrievedContext {
    /// Included pages, most similar first.
    pub entries: Vec<ContextEntry>,
    /// Pages that contributed nothing, in ranking order.
    pub skipped: Vec<SkippedDocument>,
    text: String,
    truncated: bool,
}

impl RetrievedContext {
    /// The rendered context, marker included when truncated.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// First `max_chars` characters of `text`, never splitting a character.
fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    per_document_chars: usize,
    total_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(PER_DOCUMENT_CHAR_LIMIT, CONTEXT_CHAR_LIMIT)
    }
}

impl From<&RetrievalSettings> for ContextAssembler {
    fn from(settings: &RetrievalSettings) -> Self {
        Self::new(settings.per_document_chars, settings.context_chars)
    }
}

impl ContextAssembler {
    pub fn new(per_document_chars: usize, total_chars: usize) -> Self {
        Self {
            per_document_chars,
            total_chars,
        }
    }

    /// Fetch `ids` from `store` in order and assemble their text.
    pub async fn assemble<S: DocumentStore>(&self, ids: &[DocId], store: &S) -> RetrievedContext {
        let mut fetched = Vec::with_capacity(ids.len());
        for id in ids {
            fetched.push((id.clone(), store.fetch_document(id).await));
        }
        self.build_context(fetched)
    }

    /// Same as [`assemble`](Self::assemble) with a synchronous fetch function.
    pub fn assemble_with<F>(&self, ids: &[DocId], mut fetch: F) -> RetrievedContext
    where
        F: FnMut(&DocId) -> Result<String, FetchError>,
    {
        let fetched = ids.iter().map(|id| (id.clone(), fetch(id))).collect();
        self.build_context(fetched)
    }

    fn build_context(&self, fetched: Vec<(DocId, Result<String, FetchError>)>) -> RetrievedContext {
        let mut context = RetrievedContext::default();

        for (id, result) in fetched {
            match result {
                Ok(text) => {
                    let text = take_chars(&text, self.per_document_chars).to_string();
                    context.entries.push(ContextEntry { id, text });
                }
                Err(e) => {
                    warn!("Error fetching content for page ID {id}: {e}");
                    context.skipped.push(SkippedDocument {
                        id,
                        reason: e,
                    });
                }
            }
        }

        let joined = context
            .entries
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if joined.chars().count() > self.total_chars {
            context.text = format!("{}{}", take_chars(&joined, self.total_chars), TRUNCATION_MARKER);
            context.truncated = true;
        } else {
            context.text = joined;
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    fn ids(raw: &[u64]) -> Vec<DocId> {
        raw.iter().copied().map(DocId::from).collect()
    }

    #[test]
    fn joins_pages_in_ranking_order() {
        let assembler = ContextAssembler::default();
        let context = assembler.assemble_with(&ids(&[2, 1]), |id| Ok(format!("page {id}")));
        assert_eq!(context.as_str(), "page 2\npage 1");
        assert!(!context.is_truncated());
        assert!(!context.as_str().contains(TRUNCATION_MARKER));
    }

    #[test]
    fn cuts_each_page_to_the_per_document_limit() {
        let assembler = ContextAssembler::default();
        let context = assembler.assemble_with(&ids(&[1]), |_| Ok("x".repeat(1500)));
        assert_eq!(context.entries[0].text.chars().count(), PER_DOCUMENT_CHAR_LIMIT);
        assert_eq!(context.as_str().len(), PER_DOCUMENT_CHAR_LIMIT);
    }

    #[test]
    fn marks_truncation_past_the_global_limit() {
        let assembler = ContextAssembler::default();
        let context =
            assembler.assemble_with(&ids(&[1, 2, 3, 4, 5, 6, 7]), |_| Ok("y".repeat(1000)));

        assert!(context.is_truncated());
        assert!(context.as_str().ends_with(TRUNCATION_MARKER));
        assert_eq!(
            context.as_str().chars().count(),
            CONTEXT_CHAR_LIMIT + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn exactly_at_the_limit_is_not_truncated() {
        // 6 pages of 999 chars + 5 newlines = 5999
        let assembler = ContextAssembler::default();
        let context = assembler.assemble_with(&ids(&[1, 2, 3, 4, 5, 6]), |_| Ok("z".repeat(999)));
        assert_eq!(context.as_str().chars().count(), 5999);
        assert!(!context.is_truncated());

        let assembler = ContextAssembler::new(1000, 5999);
        assert!(!assembler
            .assemble_with(&ids(&[1, 2, 3, 4, 5, 6]), |_| Ok("z".repeat(999)))
            .is_truncated());
    }

    #[test]
    fn output_never_exceeds_cap_plus_marker() {
        let cap = CONTEXT_CHAR_LIMIT + TRUNCATION_MARKER.chars().count();
        for pages in 0..10u64 {
            for len in [0usize, 1, 500, 999, 1000, 1001, 4000] {
                let page_ids: Vec<DocId> = (0..pages).map(DocId::from).collect();
                let context = ContextAssembler::default()
                    .assemble_with(&page_ids, |_| Ok("a".repeat(len)));
                assert!(context.as_str().chars().count() <= cap);
                let over = context
                    .entries
                    .iter()
                    .map(|e| e.text.chars().count())
                    .sum::<usize>()
                    + context.entries.len().saturating_sub(1)
                    > CONTEXT_CHAR_LIMIT;
                assert_eq!(context.as_str().ends_with(TRUNCATION_MARKER), over);
            }
        }
    }

    #[test]
    fn multibyte_text_is_cut_on_character_boundaries() {
        let assembler = ContextAssembler::new(3, 5);
        let context = assembler.assemble_with(&ids(&[1, 2]), |_| Ok("ééééé".to_string()));
        assert_eq!(context.entries[0].text, "ééé");
        assert_eq!(context.as_str(), format!("ééé\né{TRUNCATION_MARKER}"));
    }

    #[test]
    fn failed_pages_are_skipped() {
        let assembler = ContextAssembler::default();
        let context = assembler.assemble_with(&ids(&[1, 2, 3]), |id| match id.as_str() {
            "1" => Ok("first".into()),
            "2" => Err(FetchError::transient(id, "connection reset")),
            _ => Err(FetchError::NotFound(id.clone())),
        });

        assert_eq!(context.as_str(), "first");
        assert_eq!(context.skipped.len(), 2);
        assert!(matches!(context.skipped[0].reason, FetchError::Transient { .. }));
        assert_eq!(context.skipped[1].reason, FetchError::NotFound(DocId::from(3u64)));
    }

    #[test]
    fn empty_pages_keep_their_place() {
        let assembler = ContextAssembler::default();
        let context = assembler.assemble_with(&ids(&[1, 2]), |id| match id.as_str() {
            "1" => Ok(String::new()),
            _ => Ok("two".into()),
        });

        assert_eq!(context.as_str(), "\ntwo");
        assert_eq!(context.entries.len(), 2);
        assert!(context.skipped.is_empty());
    }

    #[test]
    fn same_inputs_same_output() {
        let assembler = ContextAssembler::default();
        let fetch = |id: &DocId| Ok(format!("content of {id}"));
        assert_eq!(
            assembler.assemble_with(&ids(&[3, 1, 2]), fetch),
            assembler.assemble_with(&ids(&[3, 1, 2]), fetch)
        );
    }

    #[tokio::test]
    async fn transient_failure_in_store_keeps_remaining_pages() {
        let store = MemoryStore::new([
            (1u64, "The sky is blue"),
            (2u64, "Bananas are yellow"),
            (3u64, "Grass is green"),
        ])
        .with_transient_failure(2u64);

        let context = ContextAssembler::default()
            .assemble(&ids(&[1, 2, 3]), &store)
            .await;

        assert_eq!(context.as_str(), "The sky is blue\nGrass is green");
        assert_eq!(context.skipped[0].id, DocId::from(2u64));
    }
}
