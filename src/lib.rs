//! # bosala-rag
//!
//! Retrieval-augmented generation pipeline for Arabic question answering.
//!
//! The crate composes four capabilities behind trait seams:
//!
//! - **Normalization & chunking** ([`normalize`], [`chunking`]) — canonical
//!   Arabic text and sentence-group chunks.
//! - **Embedding** ([`embedding`]) — asymmetric query/passage encoding with
//!   soft-fail batch semantics.
//! - **Vector index** ([`vectorstore`], [`inmemory`], `qdrant`) — named
//!   collections with cosine search that degrades to empty results instead
//!   of failing the request.
//! - **Generation** ([`generator`], `gemini`) — prompt assembly, explicit
//!   decoding parameters, and structured outcome classification with stable
//!   Arabic sentinel answers.
//!
//! [`pipeline::RagPipeline`] wires them together for answering;
//! [`ingest::Ingestor`] runs the reverse direction (document → index).
//!
//! Remote backends are feature-gated: `openai` (embeddings and chat
//! generation), `gemini` (generation), `qdrant` (index). The core builds
//! with no features and the in-memory index.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod generator;
pub mod ingest;
pub mod inmemory;
pub mod normalize;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{SentenceChunker, chunk_sentences, split_into_sentences};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, AnswerOutcome, ChatEvent, Chunk, Document, PointPayload, RetrievedContext, ScoredPoint,
};
pub use embedding::{EmbedKind, Embedder, EmbeddingProvider};
pub use error::{RagError, Result};
pub use generator::{
    AnswerGenerator, GENERATION_FAILED_SENTINEL, Generation, NO_ANSWER_SENTINEL,
};
pub use ingest::{IngestReceipt, Ingestor};
pub use inmemory::InMemoryIndex;
pub use normalize::{arabic_only, fold_for_matching, normalize_arabic};
pub use pipeline::{EventSink, RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use vectorstore::{IndexPoint, PointId, VectorIndex, sequential_points};

#[cfg(feature = "gemini")]
pub use gemini::GeminiGenerator;
#[cfg(feature = "openai")]
pub use openai::{OpenAiChatGenerator, OpenAiEmbeddings};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantIndex;
