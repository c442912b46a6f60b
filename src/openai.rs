//! OpenAI-protocol backends: embeddings and chat generation.
//!
//! Works against the OpenAI `/v1` endpoints or any server speaking the same
//! protocol (text-embeddings-inference, vLLM, LiteLLM proxies), which is how
//! multilingual E5-family models are typically served.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::RagConfig;
use crate::document::RetrievedContext;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, Generation, build_prompt, classify_output};

/// The default OpenAI embeddings API endpoint.
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "intfloat/multilingual-e5-base";

/// The default OpenAI chat completions API endpoint.
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// An [`EmbeddingProvider`] speaking the OpenAI embeddings protocol.
///
/// # Configuration
///
/// - `model` – model name (e.g. `intfloat/multilingual-e5-base`), from the
///   constructor or the `EMB_MODEL` environment variable.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment
///   variable.
/// - `base_url` – override for self-hosted servers.
///
/// # Example
///
/// ```rust,ignore
/// use bosala_rag::openai::OpenAiEmbeddings;
///
/// let provider = OpenAiEmbeddings::new("sk-...", "intfloat/multilingual-e5-base")?
///     .with_base_url("http://localhost:8080/v1/embeddings");
/// ```
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbeddings {
    /// Create a new provider with the given API key and model name.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("embedding API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: OPENAI_EMBEDDINGS_URL.into(),
        })
    }

    /// Create a new provider from the environment: the API key from
    /// `OPENAI_API_KEY` and the model name from `EMB_MODEL` (defaulting to an
    /// E5-family model).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::ConfigError("OPENAI_API_KEY environment variable not set".into())
        })?;
        let model = std::env::var("EMB_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        Self::new(api_key, model)
    }

    /// Point the provider at a different embeddings endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: "openai".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = "openai", batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest { model: &self.model, input: texts.to_vec() };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "openai", error = %e, "request failed");
                RagError::EmbeddingError {
                    provider: "openai".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = "openai", %status, "API error");
            return Err(RagError::EmbeddingError {
                provider: "openai".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "openai", error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: "openai".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        let vectors: Vec<Vec<f32>> =
            embedding_response.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: "openai".into(),
                message: format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            });
        }

        Ok(vectors)
    }
}

/// An [`AnswerGenerator`] speaking the OpenAI chat completions protocol.
///
/// The alternative generation backend to Gemini, selected by constructing
/// this implementor instead. Shares the Arabic instruction prompt and the
/// post-processing with every other backend; only the transport differs.
/// Transport and service failures are absorbed into [`Generation::failed`];
/// content-filtered or empty completions become [`Generation::no_answer`].
pub struct OpenAiChatGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    context_char_budget: usize,
}

impl OpenAiChatGenerator {
    /// Create a generator with the given API key and decoding parameters
    /// taken from `config`.
    pub fn new(api_key: impl Into<String>, config: &RagConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("chat API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_CHAT_MODEL.into(),
            base_url: OPENAI_CHAT_URL.into(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            context_char_budget: config.context_char_budget,
        })
    }

    /// Create a generator from the environment: the API key from
    /// `OPENAI_API_KEY` and the model name from `GEN_MODEL`.
    pub fn from_env(config: &RagConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::ConfigError("OPENAI_API_KEY environment variable not set".into())
        })?;
        let model =
            std::env::var("GEN_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        Ok(Self::new(api_key, config)?.with_model(model))
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at a different chat completions endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn call_model(&self, prompt: &str) -> Result<ChatResponse> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user".into(), content: prompt.to_string() }],
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::GenerationError {
                backend: "openai".into(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::GenerationError {
                backend: "openai".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        response.json().await.map_err(|e| RagError::GenerationError {
            backend: "openai".into(),
            message: format!("failed to parse response: {e}"),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
    finish_reason: Option<String>,
}

impl ChatResponse {
    /// First choice's text, `None` when empty or absent.
    fn text(&self) -> Option<&str> {
        let content = self.choices.first()?.message.as_ref()?.content.as_str();
        if content.trim().is_empty() { None } else { Some(content) }
    }

    fn was_filtered(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .is_some_and(|r| r == "content_filter")
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiChatGenerator {
    async fn generate(&self, question: &str, contexts: &[RetrievedContext]) -> Generation {
        let prompt = build_prompt(question, contexts, self.context_char_budget);
        debug!(model = %self.model, prompt_len = prompt.len(), contexts = contexts.len(), "calling chat model");

        let response = match self.call_model(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "chat generation failed");
                return Generation::failed();
            }
        };

        if response.was_filtered() {
            warn!("chat response withheld by content filter");
            return Generation::no_answer();
        }

        match response.text() {
            Some(raw) => classify_output(raw),
            None => {
                warn!("chat model returned no choice text");
                Generation::no_answer()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_text_from_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"الإجابة: القدس"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("الإجابة: القدس"));
        assert!(!response.was_filtered());
    }

    #[test]
    fn chat_response_without_choices_has_no_text() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn content_filter_finish_reason_is_filtered() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":null,"finish_reason":"content_filter"}]}"#,
        )
        .unwrap();
        assert!(response.was_filtered());
    }

    #[test]
    fn chat_generator_rejects_empty_key() {
        assert!(OpenAiChatGenerator::new("", &RagConfig::default()).is_err());
    }

    #[test]
    fn embeddings_from_env_reads_model() {
        unsafe {
            std::env::set_var("OPENAI_API_KEY", "sk-test");
            std::env::set_var("EMB_MODEL", "intfloat/multilingual-e5-large");
        }
        let provider = OpenAiEmbeddings::from_env().unwrap();
        assert_eq!(provider.model, "intfloat/multilingual-e5-large");
        unsafe {
            std::env::remove_var("EMB_MODEL");
            std::env::remove_var("OPENAI_API_KEY");
        }
    }
}
