//! This module provides functionality for loading and validating the application's configuration.
//!
//! Configuration lives in a YAML file (by default `<config_dir>/config.yaml`, see
//! [`crate::config_dir`]). Credentials can also come from the environment: the CLI
//! reads `CONFLUENCE_BASE_URL`, `CONFLUENCE_USER_EMAIL`, `CONFLUENCE_API_TOKEN`,
//! `OPENAI_API_KEY` and `OPENAI_API_BASE` and merges them over the file with
//! [`ChatConfig::with_overrides`]. The merged value is checked once at startup by
//! [`ChatConfig::validate`] and then handed to the collaborators that need it.
//!
//! # Examples
//!
//! ```no_run
//! use pagechat::config::{ChatConfig, load_config};
//!
//! let config: ChatConfig = load_config("/path/to/config.yaml".as_ref()).unwrap();
//! config.validate().unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path};

use tracing::*;

use crate::document::DocId;
use crate::error::{RagError, Result};

/// Top-level configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
pub struct ChatConfig {
    /// Where pages are fetched from.
    #[serde(default)]
    pub confluence: ConfluenceSettings,

    /// The OpenAI-compatible chat endpoint that writes answers.
    #[serde(default)]
    pub llm: LlmSettings,

    /// The sentence embedding model.
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Search depth and context window limits.
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// The corpus: pages indexed at startup.
    #[serde(default)]
    pub page_ids: Vec<DocId>,

    /// What to tell the user about pages that could not be fetched.
    #[serde(default)]
    pub fetch_failures: FetchFailurePolicy,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct ConfluenceSettings {
    /// e.g. `https://example.atlassian.net/wiki`
    pub base_url: Option<String>,
    pub user_email: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Clone)]
pub struct LlmSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_model")]
    pub model_id: String,
    #[serde(default = "default_revision")]
    pub revision: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct RetrievalSettings {
    /// Number of pages fed to the context window per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Characters kept from each page.
    #[serde(default = "default_per_document_chars")]
    pub per_document_chars: usize,
    /// Characters kept from the joined context.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

/// Both policies skip pages that fail to load. `Report` also lists them to the user.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    #[default]
    Silent,
    Report,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_top_k() -> usize {
    crate::retrieval::DEFAULT_TOP_K
}

fn default_per_document_chars() -> usize {
    crate::context::PER_DOCUMENT_CHAR_LIMIT
}

fn default_context_chars() -> usize {
    crate::context::CONTEXT_CHAR_LIMIT
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            temperature: None,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: default_embedding_model(),
            revision: default_revision(),
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            per_document_chars: default_per_document_chars(),
            context_chars: default_context_chars(),
        }
    }
}

/// Keep the first five characters of a secret, enough to tell keys apart in logs.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(5).collect();
    format!("{visible}*")
}

fn masked(secret: &Option<String>) -> Option<String> {
    secret.as_deref().map(mask_secret)
}

impl fmt::Debug for ConfluenceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceSettings")
            .field("base_url", &self.base_url)
            .field("user_email", &self.user_email)
            .field("api_token", &masked(&self.api_token))
            .finish()
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_base", &self.api_base)
            .field("api_key", &masked(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Values picked up from the command line or the environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub confluence_base_url: Option<String>,
    pub confluence_user_email: Option<String>,
    pub confluence_api_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
}

/// Treat empty strings as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Return the value of a required setting or a [`RagError::Configuration`] naming it.
pub(crate) fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    present(value).ok_or_else(|| RagError::Configuration(format!("missing {key}")))
}

impl ChatConfig {
    /// Overlay any provided credentials on top of the file values.
    pub fn with_overrides(mut self, overrides: CredentialOverrides) -> Self {
        let CredentialOverrides {
            confluence_base_url,
            confluence_user_email,
            confluence_api_token,
            openai_api_key,
            openai_api_base,
        } = overrides;

        if confluence_base_url.is_some() {
            self.confluence.base_url = confluence_base_url;
        }
        if confluence_user_email.is_some() {
            self.confluence.user_email = confluence_user_email;
        }
        if confluence_api_token.is_some() {
            self.confluence.api_token = confluence_api_token;
        }
        if openai_api_key.is_some() {
            self.llm.api_key = openai_api_key;
        }
        if let Some(api_base) = openai_api_base {
            self.llm.api_base = api_base;
        }
        self
    }

    /// Check that everything needed to answer questions is present.
    ///
    /// # Errors
    /// A single [`RagError::Configuration`] listing every missing or invalid key.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let required = [
            ("confluence.base_url (CONFLUENCE_BASE_URL)", &self.confluence.base_url),
            ("confluence.user_email (CONFLUENCE_USER_EMAIL)", &self.confluence.user_email),
            ("confluence.api_token (CONFLUENCE_API_TOKEN)", &self.confluence.api_token),
            ("llm.api_key (OPENAI_API_KEY)", &self.llm.api_key),
        ];
        for (key, value) in required {
            if present(value).is_none() {
                problems.push(format!("missing {key}"));
            }
        }

        if self.page_ids.is_empty() {
            problems.push("page_ids is empty".to_string());
        }
        if self.retrieval.top_k == 0 {
            problems.push("retrieval.top_k must be at least 1".to_string());
        }

        if problems.is_empty() {
            info!("Base URL: {:?}", self.confluence.base_url);
            info!("User Email: {:?}", self.confluence.user_email);
            info!("API Token: {:?}", masked(&self.confluence.api_token));
            Ok(())
        } else {
            Err(RagError::Configuration(problems.join(", ")))
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Errors
///
/// - [`RagError::Io`] if the file cannot be read.
/// - [`RagError::Configuration`] if the YAML does not describe a [`ChatConfig`].
pub fn load_config(file: &Path) -> Result<ChatConfig> {
    debug!("Loading config from: {}", file.display());
    let content = fs::read_to_string(file)?;
    serde_yaml::from_str(&content)
        .map_err(|e| RagError::Configuration(format!("invalid {}: {e}", file.display())))
}

/// Like [`load_config`], but a missing file yields the defaults so the
/// environment alone can configure the bot.
pub fn load_or_default(file: &Path) -> Result<ChatConfig> {
    if file.exists() {
        load_config(file)
    } else {
        info!("No config at {}, using defaults", file.display());
        Ok(ChatConfig::default())
    }
}
