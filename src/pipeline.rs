//! RAG pipeline orchestrator.
//!
//! [`RagPipeline`] composes the [`Retriever`] and an [`AnswerGenerator`]
//! behind one `answer()` call: retrieve, select contexts, generate, classify.
//! Every handle is injected at construction time and built exactly once; a
//! failed construction surfaces as an error from the builder, never as a
//! per-request crash.
//!
//! # Example
//!
//! ```rust,ignore
//! use bosala_rag::{RagPipeline, RagConfig, InMemoryIndex};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryIndex::new()))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! let answer = pipeline.answer("ما هي عاصمة فلسطين؟").await;
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::RagConfig;
use crate::document::{Answer, ChatEvent, RetrievedContext};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::normalize::normalize_arabic;
use crate::retriever::Retriever;
use crate::vectorstore::VectorIndex;

/// Receives one analytics record per pipeline call.
///
/// The pipeline computes the fields and hands them off; persistence is the
/// sink's concern. Implementations must be cheap or defer work internally,
/// since they run on the request path.
pub trait EventSink: Send + Sync {
    /// Record one chat interaction.
    fn record(&self, event: &ChatEvent);
}

/// The RAG pipeline orchestrator.
///
/// Stateless per call; the retriever cache is the only cross-request state.
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer a question: retrieve, select contexts, generate, classify.
    ///
    /// Always returns a well-formed [`Answer`]; failures are communicated
    /// through the answer's sentinel text and outcome, never as an error.
    /// The returned contexts are the exact records retrieved for this call,
    /// preserving provenance for logging and evaluation.
    pub async fn answer(&self, question: &str) -> Answer {
        let normalized = normalize_arabic(question);
        let retrieved = self.retriever.retrieve(&normalized).await;

        // Contexts offered to the generator: good scores first, but never
        // drop to nothing when at least one hit exists at all.
        let selected = self.select_contexts(&retrieved);

        // Generation dominates request latency; measure around it alone.
        let started = Instant::now();
        let generation = self.generator.generate(&normalized, &selected).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let answer = Answer {
            question: normalized,
            answer: generation.text,
            contexts: selected,
            outcome: generation.outcome,
        };

        info!(
            outcome = ?answer.outcome,
            latency_ms,
            contexts = answer.contexts.len(),
            "answered question"
        );

        if let Some(sink) = &self.event_sink {
            sink.record(&self.event_for(&answer, latency_ms));
        }

        answer
    }

    /// Keep contexts above the score threshold, capped at `top_k`; fall back
    /// to the single best hit when everything scored low, so the generator
    /// still sees the closest passage the index had.
    fn select_contexts(&self, retrieved: &[RetrievedContext]) -> Vec<RetrievedContext> {
        let selected: Vec<RetrievedContext> = retrieved
            .iter()
            .filter(|c| c.score > self.config.score_threshold)
            .take(self.config.top_k)
            .cloned()
            .collect();

        if selected.is_empty() {
            return retrieved.first().cloned().into_iter().collect();
        }
        selected
    }

    fn event_for(&self, answer: &Answer, latency_ms: u64) -> ChatEvent {
        ChatEvent {
            question: answer.question.clone(),
            answer: answer.answer.clone(),
            latency_ms,
            top_score: answer.contexts.first().map(|c| c.score),
            num_contexts: answer.contexts.len(),
            success: answer.outcome.is_success(),
            error_type: answer.outcome.error_kind(),
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider, vector index, and generator are required; the
/// event sink is optional.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the generation backend.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set an optional analytics event sink.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Build the [`RagPipeline`], validating that all required parts are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required component is
    /// missing. This is the construction-time failure point demanded by the
    /// error model: a pipeline that cannot be built never serves requests.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        let embedder = Embedder::new(embedding_provider);
        let retriever = Retriever::new(
            embedder,
            vector_index,
            config.collection.clone(),
            config.top_k,
            config.cache_enabled,
        );

        Ok(RagPipeline { config, retriever, generator, event_sink: self.event_sink })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::generator::Generation;

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, _q: &str, _c: &[RetrievedContext]) -> Generation {
            Generation::answered("جواب")
        }
    }

    #[test]
    fn build_fails_without_components() {
        let err = RagPipeline::builder().config(RagConfig::default()).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn select_contexts_falls_back_to_best_hit() {
        let pipeline = RagPipeline::builder()
            .embedding_provider(Arc::new(crate::embedding::tests_support::ZeroProvider))
            .vector_index(Arc::new(crate::inmemory::InMemoryIndex::new()))
            .generator(Arc::new(EchoGenerator))
            .build()
            .unwrap();

        let low = |score| RetrievedContext {
            score,
            text: format!("نص {score}"),
            doc_id: None,
            chunk_index: None,
            question: None,
            answer: None,
        };
        let retrieved = vec![low(0.2), low(0.1)];
        let selected = pipeline.select_contexts(&retrieved);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].score, 0.2);

        assert!(pipeline.select_contexts(&[]).is_empty());
    }
}
