//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the collection queried at answer time.
    pub collection: String,
    /// Sentences per chunk at ingestion time.
    pub group_size: usize,
    /// Number of top results to request from vector search.
    pub top_k: usize,
    /// Contexts scoring at or below this are not offered to the generator.
    pub score_threshold: f32,
    /// Maximum number of tokens the generator may produce.
    pub max_output_tokens: u32,
    /// Sampling temperature for generation.
    pub temperature: f32,
    /// Nucleus-sampling top-p for generation.
    pub top_p: f32,
    /// Per-context character budget when assembling the prompt.
    pub context_char_budget: usize,
    /// Whether the retriever caches results per normalized question.
    pub cache_enabled: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: "arcd_contexts".to_string(),
            group_size: 5,
            top_k: 5,
            score_threshold: 0.3,
            max_output_tokens: 512,
            temperature: 0.4,
            top_p: 0.9,
            context_char_budget: 1000,
            cache_enabled: true,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `QDRANT_CTX_COLLECTION`, `CHUNK_GROUP_SIZE`,
    /// `TOP_K`, `SCORE_THRESHOLD`, `GEN_MAX_NEW_TOKENS`, `GEN_TEMPERATURE`,
    /// `GEN_TOP_P`. Backend constructors read their own variables
    /// (`QDRANT_URL`, `QDRANT_API_KEY`, `EMB_MODEL`, `GEN_MODEL`) via their
    /// `from_env` methods.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] when a variable is present but does
    /// not parse, or when the resulting values fail validation.
    pub fn from_env() -> Result<Self> {
        fn parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
            match std::env::var(key) {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| RagError::ConfigError(format!("invalid value for {key}: {raw}"))),
                Err(_) => Ok(default),
            }
        }

        let defaults = Self::default();
        let config = Self {
            collection: std::env::var("QDRANT_CTX_COLLECTION").unwrap_or(defaults.collection),
            group_size: parse("CHUNK_GROUP_SIZE", defaults.group_size)?,
            top_k: parse("TOP_K", defaults.top_k)?,
            score_threshold: parse("SCORE_THRESHOLD", defaults.score_threshold)?,
            max_output_tokens: parse("GEN_MAX_NEW_TOKENS", defaults.max_output_tokens)?,
            temperature: parse("GEN_TEMPERATURE", defaults.temperature)?,
            top_p: parse("GEN_TOP_P", defaults.top_p)?,
            context_char_budget: defaults.context_char_budget,
            cache_enabled: defaults.cache_enabled,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.collection.is_empty() {
            return Err(RagError::ConfigError("collection name must not be empty".to_string()));
        }
        if self.group_size == 0 {
            return Err(RagError::ConfigError("group_size must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(RagError::ConfigError(format!(
                "score_threshold must be within [0, 1], got {}",
                self.score_threshold
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(RagError::ConfigError(format!(
                "top_p must be within (0, 1], got {}",
                self.top_p
            )));
        }
        if self.temperature < 0.0 {
            return Err(RagError::ConfigError(format!(
                "temperature must not be negative, got {}",
                self.temperature
            )));
        }
        if self.context_char_budget == 0 {
            return Err(RagError::ConfigError(
                "context_char_budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection queried at answer time.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the number of sentences per chunk.
    pub fn group_size(mut self, size: usize) -> Self {
        self.config.group_size = size;
        self
    }

    /// Set the number of top results to request from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score for contexts offered to the generator.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the nucleus-sampling top-p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = top_p;
        self
    }

    /// Set the per-context character budget for prompt assembly.
    pub fn context_char_budget(mut self, budget: usize) -> Self {
        self.config.context_char_budget = budget;
        self
    }

    /// Enable or disable the retriever's per-question result cache.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] on out-of-range parameters.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
