//! The interactive question loop.
//!
//! [`interactive_mode`] reads one question per line and prints the bot's
//! answer. Typing `exit` (any case) or closing the input ends the session.
//! A failed question prints `Error: ...` and the loop keeps going.
//!
//! Input and output are plain [`BufRead`]/[`Write`] handles so the loop can be
//! driven from tests as well as from the terminal.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::chatbot::{ConfluenceChatbot, IndexReport};
use crate::config::FetchFailurePolicy;
use crate::confluence::DocumentStore;
use crate::context::SkippedDocument;
use crate::document::DocId;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::llm::LanguageModel;

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a DocId>) -> String {
    ids.into_iter()
        .map(DocId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print the pages indexing could not use. Prints nothing under
/// [`FetchFailurePolicy::Silent`] or when every page was indexed.
pub fn write_index_report<W: Write>(
    output: &mut W,
    report: &IndexReport,
    policy: FetchFailurePolicy,
) -> Result<()> {
    if policy == FetchFailurePolicy::Silent {
        return Ok(());
    }
    if !report.fetch_failures.is_empty() {
        let ids = join_ids(report.fetch_failures.iter().map(|e| e.id()));
        writeln!(output, "Could not fetch pages: {ids}")?;
    }
    if !report.blank.is_empty() {
        writeln!(output, "Skipped empty pages: {}", join_ids(&report.blank))?;
    }
    if !report.unembeddable.is_empty() {
        writeln!(
            output,
            "Skipped unembeddable pages: {}",
            join_ids(&report.unembeddable)
        )?;
    }
    Ok(())
}

fn write_context_skips<W: Write>(output: &mut W, skipped: &[SkippedDocument]) -> Result<()> {
    if !skipped.is_empty() {
        let ids = join_ids(skipped.iter().map(|s| &s.id));
        writeln!(output, "(Left out of the context: {ids})")?;
    }
    Ok(())
}

/// Run the question loop until `exit` or end of input.
///
/// # Errors
/// Only I/O errors on `input` or `output` end the loop early.
pub async fn interactive_mode<E, S, L, R, W>(
    bot: &ConfluenceChatbot<E, S, L>,
    policy: FetchFailurePolicy,
    mut input: R,
    output: &mut W,
) -> Result<()>
where
    E: Embedder,
    S: DocumentStore,
    L: LanguageModel,
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(output, "You: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            writeln!(output, "Goodbye!")?;
            break;
        }

        debug!("Question: {question}");
        match bot.chat_with_context(question).await {
            Ok(reply) => {
                writeln!(output, "Bot: {}", reply.answer)?;
                if policy == FetchFailurePolicy::Report {
                    write_context_skips(output, &reply.context.skipped)?;
                }
            }
            Err(e) => writeln!(output, "Error: {e}")?,
        }
    }
    Ok(())
}
