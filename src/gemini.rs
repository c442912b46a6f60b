//! Gemini generation backend over the REST `generateContent` endpoint.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::RagConfig;
use crate::document::RetrievedContext;
use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, Generation, build_prompt, classify_output};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default generation model.
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// An [`AnswerGenerator`] backed by the Gemini API.
///
/// Builds the shared Arabic instruction prompt, calls `generateContent` with
/// explicit decoding parameters, and post-processes the candidate text. All
/// transport and service failures are absorbed into [`Generation::failed`];
/// empty or safety-blocked candidates become [`Generation::no_answer`].
///
/// # Example
///
/// ```rust,ignore
/// use bosala_rag::gemini::GeminiGenerator;
///
/// let generator = GeminiGenerator::from_env(&config)?;
/// let generation = generator.generate("ما هي عاصمة فلسطين؟", &contexts).await;
/// ```
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    context_char_budget: usize,
}

impl GeminiGenerator {
    /// Create a generator with the given API key and decoding parameters
    /// taken from `config`.
    pub fn new(api_key: impl Into<String>, config: &RagConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            context_char_budget: config.context_char_budget,
        })
    }

    /// Create a generator from the environment: the API key from
    /// `GEMINI_API_KEY` and the model name from `GEN_MODEL`.
    pub fn from_env(config: &RagConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            RagError::ConfigError("GEMINI_API_KEY environment variable not set".into())
        })?;
        let model = std::env::var("GEN_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, config)?.with_model(model))
    }

    /// Set the model name (e.g. `gemini-2.5-pro`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at a different API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn call_model(&self, prompt: &str) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt.to_string() }],
                role: None,
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
                top_p: self.top_p,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::GenerationError {
                backend: "gemini".into(),
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RagError::GenerationError {
                backend: "gemini".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        response.json().await.map_err(|e| RagError::GenerationError {
            backend: "gemini".into(),
            message: format!("failed to parse response: {e}"),
        })
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated candidate text, `None` when empty or withheld.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let text: String =
            content.parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("");
        if text.trim().is_empty() { None } else { Some(text) }
    }

    fn was_blocked(&self) -> bool {
        self.prompt_feedback.as_ref().is_some_and(|f| f.block_reason.is_some())
            || self
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .is_some_and(|r| r == "SAFETY" || r == "BLOCKLIST" || r == "PROHIBITED_CONTENT")
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn generate(&self, question: &str, contexts: &[RetrievedContext]) -> Generation {
        let prompt = build_prompt(question, contexts, self.context_char_budget);
        debug!(model = %self.model, prompt_len = prompt.len(), contexts = contexts.len(), "calling gemini");

        let response = match self.call_model(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "gemini generation failed");
                return Generation::failed();
            }
        };

        if response.was_blocked() {
            warn!("gemini response withheld by safety policy");
            return Generation::no_answer();
        }

        match response.text() {
            Some(raw) => classify_output(&raw),
            None => {
                warn!("gemini returned no candidate text");
                Generation::no_answer()
            }
        }
    }
}
