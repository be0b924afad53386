//! # pagechat (library root)
//!
//! Answer questions about a fixed set of Confluence pages with a
//! retrieval-augmented language model.
//!
//! At startup the configured pages are fetched, embedded with a local sentence
//! embedding model and stored in an in-memory vector index. Each question is
//! embedded the same way, the closest pages are fetched again and cut down to a
//! bounded context, and a single prompt built from the question and that
//! context goes to an OpenAI-compatible chat endpoint.
//!
//! ## Modules
//! - [`document`], [`error`]: shared types.
//! - [`embeddings`]: the [`Embedder`](embeddings::Embedder) trait and the
//!   candle-backed [`SentenceEmbedder`](embeddings::SentenceEmbedder).
//! - [`vector_index`]: exact nearest-neighbour search.
//! - [`retrieval`]: embedding + index, from text to ranked page ids.
//! - [`context`]: bounded context assembly.
//! - [`confluence`], [`llm`]: the external collaborators.
//! - [`chatbot`]: the orchestrator tying it all together.
//! - [`commands`], [`config`], [`repl`]: the CLI surface.

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod chatbot;
pub mod commands;
pub mod config;
pub mod confluence;
pub mod context;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod repl;
pub mod retrieval;
pub mod vector_index;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{FetchError, RagError, Result};

/// Return the per-platform configuration directory used by pagechat.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "pagechat", "pagechat")`, e.g. `~/.config/pagechat` on Linux.
///
/// The directory is **not** created by this function.
///
/// # Errors
/// [`RagError::Configuration`] if the platform configuration directory cannot
/// be determined (rare, but possible in sandboxed environments).
///
/// # Examples
/// ```rust
/// let cfg = pagechat::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "pagechat", "pagechat").ok_or_else(|| {
        RagError::Configuration("Unable to determine config directory".to_string())
    })?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// The default configuration file: `config_dir()/config.yaml`.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yaml"))
}
