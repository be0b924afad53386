//! # Language model
//!
//! [`LanguageModel`] is the answer-writing collaborator: one prompt in, one
//! generated text out. [`OpenAiChat`] implements it against any
//! OpenAI-compatible `/chat/completions` endpoint with `async-openai`.
//!
//! Failures of every kind (network, quota, malformed response) come back as
//! [`RagError::UpstreamUnavailable`]. Nothing is retried here.
//!
//! ```no_run
//! use pagechat::config::LlmSettings;
//! use pagechat::llm::{LanguageModel, OpenAiChat};
//!
//! # async fn demo() -> Result<(), pagechat::RagError> {
//! let settings = LlmSettings { api_key: Some("sk-...".into()), ..Default::default() };
//! let llm = OpenAiChat::new(&settings)?;
//! println!("{}", llm.generate("Say hello").await?);
//! # Ok(()) }
//! ```

use std::future::Future;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use tracing::debug;

use crate::config::{LlmSettings, require};
use crate::error::{RagError, Result};

/// Generates text for a prompt.
pub trait LanguageModel {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

fn upstream(e: impl std::fmt::Display) -> RagError {
    RagError::UpstreamUnavailable(e.to_string())
}

pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiChat {
    /// # Errors
    /// [`RagError::Configuration`] if no API key is configured.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let api_key = require(&settings.api_key, "llm.api_key")?;
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(settings.api_base.trim_end_matches('/'));
        debug!("Client created for {} ({})", settings.api_base, settings.model);

        Ok(Self {
            client: Client::with_config(openai_config),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

impl LanguageModel for OpenAiChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(upstream)?
            .into();

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.model.clone()).messages(vec![message]);
        if let Some(temperature) = self.temperature {
            request.temperature(temperature);
        }
        let request = request.build().map_err(upstream)?;

        debug!("Sending request: {:?}", request);

        let response = self.client.chat().create(request).await.map_err(upstream)?;

        let contents: Vec<String> = response
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect();

        if contents.is_empty() {
            return Err(RagError::UpstreamUnavailable(
                "response contained no message content".to_string(),
            ));
        }
        let answer = contents.concat();
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings_for(server: &MockServer) -> LlmSettings {
        LlmSettings {
            api_base: server.url("/v1"),
            api_key: Some("mock_api_key".into()),
            model: "mock_model".into(),
            temperature: None,
        }
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let settings = LlmSettings::default();
        assert!(matches!(
            OpenAiChat::new(&settings),
            Err(RagError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn returns_the_generated_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .body_includes("User Query: why?");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-1",
                    "object": "chat.completion",
                    "created": 1700000000,
                    "model": "mock_model",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": "Because." },
                        "finish_reason": "stop"
                    }]
                }));
            })
            .await;

        let llm = OpenAiChat::new(&settings_for(&server)).unwrap();
        let answer = llm.generate("User Query: why?\nContext: ").await.unwrap();

        mock.assert_async().await;
        assert_eq!(answer, "Because.");
    }

    fn completion_with(choices: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-2",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "mock_model",
            "choices": choices
        })
    }

    #[tokio::test]
    async fn empty_content_is_a_valid_answer() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(completion_with(json!([{
                    "index": 0,
                    "message": { "role": "assistant", "content": "" },
                    "finish_reason": "stop"
                }])));
            })
            .await;

        let llm = OpenAiChat::new(&settings_for(&server)).unwrap();
        assert_eq!(llm.generate("p").await.unwrap(), "");
    }

    #[tokio::test]
    async fn no_choices_is_upstream_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(completion_with(json!([])));
            })
            .await;

        let llm = OpenAiChat::new(&settings_for(&server)).unwrap();
        assert!(matches!(
            llm.generate("p").await,
            Err(RagError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn api_errors_are_upstream_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401).json_body(json!({
                    "error": {
                        "message": "Incorrect API key provided",
                        "type": "invalid_request_error",
                        "param": null,
                        "code": "invalid_api_key"
                    }
                }));
            })
            .await;

        let llm = OpenAiChat::new(&settings_for(&server)).unwrap();
        let err = llm.generate("hello").await.unwrap_err();
        assert!(matches!(err, RagError::UpstreamUnavailable(m) if m.contains("Incorrect API key")));
    }
}
