//! End-to-end pipeline scenarios with mock embedding and generation backends.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use bosala_rag::chunking::SentenceChunker;
use bosala_rag::document::{ChatEvent, Document, RetrievedContext};
use bosala_rag::embedding::{Embedder, EmbeddingProvider};
use bosala_rag::error::{RagError, Result};
use bosala_rag::generator::{
    AnswerGenerator, GENERATION_FAILED_SENTINEL, Generation, NO_ANSWER_SENTINEL, build_prompt,
    classify_output,
};
use bosala_rag::ingest::Ingestor;
use bosala_rag::inmemory::InMemoryIndex;
use bosala_rag::pipeline::{EventSink, RagPipeline};
use bosala_rag::{AnswerOutcome, RagConfig, VectorIndex};

/// Topic-bucket embedder: texts mentioning the same country land on the same
/// axis, so cosine retrieval behaves predictably without a real model.
struct TopicProvider;

#[async_trait]
impl EmbeddingProvider for TopicProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let topics = ["فلسطين", "فرنسا", "مصر"];
        let mut v = vec![0.0_f32; topics.len() + 1];
        for (i, topic) in topics.iter().enumerate() {
            if text.contains(topic) {
                v[i] = 1.0;
            }
        }
        // Shared component so unrelated texts are near-orthogonal, not zero.
        v[topics.len()] = 0.2;
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        Ok(v.into_iter().map(|x| x / norm).collect())
    }
}

/// Embedding provider that always fails, for degraded-path scenarios.
struct BrokenProvider;

#[async_trait]
impl EmbeddingProvider for BrokenProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "broken".into(), message: "down".into() })
    }
}

/// Generator that behaves like an instruction-following model: echoes the
/// answer tag with text drawn from the first context, or the no-answer
/// marker when the context block is empty.
struct ModelLikeGenerator;

#[async_trait]
impl AnswerGenerator for ModelLikeGenerator {
    async fn generate(&self, question: &str, contexts: &[RetrievedContext]) -> Generation {
        let prompt = build_prompt(question, contexts, 1000);
        assert!(prompt.contains("السؤال:"), "prompt must contain the question frame");
        let raw = match contexts.first() {
            Some(context) => format!("الإجابة: {}", context.text),
            None => "لا توجد إجابة في السياق.".to_string(),
        };
        classify_output(&raw)
    }
}

/// Generator whose transport always fails.
struct DownGenerator;

#[async_trait]
impl AnswerGenerator for DownGenerator {
    async fn generate(&self, _q: &str, _c: &[RetrievedContext]) -> Generation {
        Generation::failed()
    }
}

#[derive(Default)]
struct CapturingSink {
    events: Mutex<Vec<ChatEvent>>,
}

impl EventSink for CapturingSink {
    fn record(&self, event: &ChatEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

async fn seeded_index(embedder: &Embedder) -> Arc<InMemoryIndex> {
    let index = Arc::new(InMemoryIndex::new());
    let ingestor = Ingestor::from_config(embedder.clone(), index.clone(), &RagConfig::default());
    ingestor.prepare_collection("arcd_contexts", false).await.unwrap();
    let docs = vec![
        Document::new("d0", "القدس هي عاصمة فلسطين."),
        Document::new("d1", "باريس هي عاصمة فرنسا."),
        Document::new("d2", "القاهرة هي عاصمة مصر."),
    ];
    ingestor.ingest_documents("arcd_contexts", &docs, 0).await.unwrap();
    index
}

fn pipeline(
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<InMemoryIndex>,
    generator: Arc<dyn AnswerGenerator>,
    sink: Arc<CapturingSink>,
) -> RagPipeline {
    RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(provider)
        .vector_index(index)
        .generator(generator)
        .event_sink(sink)
        .build()
        .unwrap()
}

#[tokio::test]
async fn answers_capital_question_from_ingested_corpus() {
    let provider = Arc::new(TopicProvider);
    let embedder = Embedder::new(provider.clone());
    let index = seeded_index(&embedder).await;
    let sink = Arc::new(CapturingSink::default());
    let pipeline = pipeline(provider, index, Arc::new(ModelLikeGenerator), sink.clone());

    let answer = pipeline.answer("ما هي عاصمة فلسطين؟").await;

    assert_eq!(answer.outcome, AnswerOutcome::Answered);
    assert!(answer.answer.contains("القدس"), "expected القدس in {:?}", answer.answer);
    assert_ne!(answer.answer, NO_ANSWER_SENTINEL);

    // Top retrieved context is the Palestine chunk with a solid score.
    let top = &answer.contexts[0];
    assert!(top.text.contains("القدس"));
    assert!(top.score >= 0.3, "top score too low: {}", top.score);

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(events[0].error_type, None);
    assert_eq!(events[0].num_contexts, answer.contexts.len());
    assert_eq!(events[0].top_score, Some(top.score));
}

#[tokio::test]
async fn round_trip_retrieval_finds_own_chunk() {
    let provider = Arc::new(TopicProvider);
    let embedder = Embedder::new(provider.clone());
    let index = seeded_index(&embedder).await;
    let sink = Arc::new(CapturingSink::default());
    let pipeline = pipeline(provider, index, Arc::new(ModelLikeGenerator), sink);

    // Query with the ingested chunk's own text.
    let answer = pipeline.answer("القدس هي عاصمة فلسطين.").await;
    assert!(!answer.contexts.is_empty());
    assert!(answer.contexts[0].text.contains("القدس"));
    assert!(answer.contexts[0].score >= 0.3);
}

#[tokio::test]
async fn generator_failure_yields_failure_sentinel_and_classification() {
    let provider = Arc::new(TopicProvider);
    let embedder = Embedder::new(provider.clone());
    let index = seeded_index(&embedder).await;
    let sink = Arc::new(CapturingSink::default());
    let pipeline = pipeline(provider, index, Arc::new(DownGenerator), sink.clone());

    let answer = pipeline.answer("ما هي عاصمة فلسطين؟").await;

    assert_eq!(answer.outcome, AnswerOutcome::GenerationError);
    assert_eq!(answer.answer, GENERATION_FAILED_SENTINEL);

    let events = sink.events.lock().unwrap();
    assert!(!events[0].success);
    assert_eq!(events[0].error_type, Some("generation_error"));
}

#[tokio::test]
async fn empty_retrieval_still_generates_and_classifies_context_missing() {
    // Empty index: retrieval returns nothing, the generator still runs.
    let provider = Arc::new(TopicProvider);
    let index = Arc::new(InMemoryIndex::new());
    index.ensure_collection("arcd_contexts", 4).await.unwrap();
    let sink = Arc::new(CapturingSink::default());
    let pipeline = pipeline(provider, index, Arc::new(ModelLikeGenerator), sink.clone());

    let answer = pipeline.answer("ما هي عاصمة فلسطين؟").await;

    assert_eq!(answer.outcome, AnswerOutcome::ContextMissing);
    assert_eq!(answer.answer, NO_ANSWER_SENTINEL);
    assert!(answer.contexts.is_empty());

    let events = sink.events.lock().unwrap();
    assert!(!events[0].success);
    assert_eq!(events[0].error_type, Some("context_missing"));
    assert_eq!(events[0].top_score, None);
}

#[tokio::test]
async fn broken_embedder_degrades_to_context_missing_not_panic() {
    let index = Arc::new(InMemoryIndex::new());
    index.ensure_collection("arcd_contexts", 4).await.unwrap();
    let sink = Arc::new(CapturingSink::default());
    let pipeline =
        pipeline(Arc::new(BrokenProvider), index, Arc::new(ModelLikeGenerator), sink);

    let answer = pipeline.answer("ما هي عاصمة فلسطين؟").await;
    assert_eq!(answer.outcome, AnswerOutcome::ContextMissing);
    assert!(answer.contexts.is_empty());
}

#[tokio::test]
async fn idempotent_single_text_ingestion() {
    let provider = Arc::new(TopicProvider);
    let embedder = Embedder::new(provider);
    let index = Arc::new(InMemoryIndex::new());
    let ingestor = Ingestor::new(embedder, index.clone(), SentenceChunker::default());
    ingestor.prepare_collection("arcd_contexts", false).await.unwrap();

    let first = ingestor.ingest_text("arcd_contexts", "القدس هي عاصمة فلسطين.").await.unwrap();
    let second =
        ingestor.ingest_text("arcd_contexts", "القُدسُ هي عاصمةُ فلسطين.").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(index.len("arcd_contexts").await, 1);
}
