//! Data types for documents, chunks, retrieved contexts, and answers.

use serde::{Deserialize, Serialize};

/// A source document to be ingested into the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (caller-assigned or content hash).
    pub id: String,
    /// The raw text content of the document.
    pub text: String,
    /// Question associated with this passage, if the corpus provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Gold answer associated with this passage, if the corpus provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Where the document came from (corpus name, `user_ingest`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    /// Create a document with no associated question/answer metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), question: None, answer: None, source: None }
    }
}

/// A contiguous group of sentences extracted from a [`Document`].
///
/// Created at ingestion time and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Ordinal of this chunk within its parent.
    pub index: usize,
    /// The chunk text (normalized sentences joined by single spaces).
    pub text: String,
}

/// Denormalized payload stored alongside each vector in the index.
///
/// Field names are heterogeneous on purpose: different ingestion jobs wrote
/// different subsets over time (bulk corpus loads fill `context_text` and
/// `raw_context`, answer-collection loads fill `answer_text`, single-text
/// ingestion fills `context_text` only). Retrieval maps them back through a
/// fixed priority order rather than relying on any one field being present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    /// Parent document id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Chunk ordinal within the parent document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    /// The chunk text as embedded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_text: Option<String>,
    /// The full (unchunked) source context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_context: Option<String>,
    /// Gold answer text, for answer-side collections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    /// Question associated with the source passage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Ingestion source tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PointPayload {
    /// Resolve the retrievable text for this payload.
    ///
    /// Fixed priority: explicit chunk text, then the raw source context, then
    /// the answer text. Returns `None` when every candidate field is absent
    /// or empty.
    pub fn best_text(&self) -> Option<&str> {
        [&self.context_text, &self.raw_context, &self.answer_text]
            .into_iter()
            .flatten()
            .map(|s| s.as_str())
            .find(|s| !s.trim().is_empty())
    }
}

/// A single search hit: payload plus similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    /// The stored point id, rendered as a string.
    pub id: String,
    /// Similarity score (cosine, higher is more relevant).
    pub score: f32,
    /// The stored payload.
    pub payload: PointPayload,
}

/// A ranked context record produced by the retriever for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Similarity score (higher is more relevant).
    pub score: f32,
    /// The context text, resolved via [`PointPayload::best_text`].
    pub text: String,
    /// Parent document id, when the payload carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Chunk ordinal within the parent document, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    /// Question associated with the source passage, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Gold answer associated with the source passage, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Outcome classification of a generation attempt.
///
/// Carried alongside the answer text so that consumers never have to
/// string-match sentinel wording to tell "the system broke" apart from "the
/// system correctly declined to guess".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The model produced a grounded answer.
    Answered,
    /// The model found no answer in the supplied context, or no context was
    /// available at all.
    ContextMissing,
    /// The generation call itself failed (transport, quota, service error).
    GenerationError,
}

impl AnswerOutcome {
    /// Whether this outcome counts as a successful interaction.
    pub fn is_success(self) -> bool {
        matches!(self, AnswerOutcome::Answered)
    }

    /// Stable error-kind string for analytics, `None` when successful.
    pub fn error_kind(self) -> Option<&'static str> {
        match self {
            AnswerOutcome::Answered => None,
            AnswerOutcome::ContextMissing => Some("context_missing"),
            AnswerOutcome::GenerationError => Some("generation_error"),
        }
    }
}

/// The structured result of one pipeline call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The normalized question the pipeline answered.
    pub question: String,
    /// The generated (or sentinel) answer text.
    pub answer: String,
    /// The exact contexts that were offered to the generator, for provenance.
    pub contexts: Vec<RetrievedContext>,
    /// Outcome classification.
    pub outcome: AnswerOutcome,
}

/// Analytics record handed to the event sink after each pipeline call.
///
/// The pipeline only computes these fields; persistence belongs to the
/// collaborator receiving the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    /// The normalized question.
    pub question: String,
    /// The answer text as returned to the caller.
    pub answer: String,
    /// Wall-clock latency of the generation call, in milliseconds.
    pub latency_ms: u64,
    /// Highest similarity score among retrieved contexts, if any.
    pub top_score: Option<f32>,
    /// Number of contexts handed to the generator.
    pub num_contexts: usize,
    /// Whether the interaction produced a grounded answer.
    pub success: bool,
    /// Stable error-kind string, `None` on success.
    pub error_type: Option<&'static str>,
}
