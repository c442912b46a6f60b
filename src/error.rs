//! Error types for the `bosala-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Configuration errors are raised once at construction time and prevent the
/// pipeline from being built. Transient service failures (embedding, search,
/// generation) are absorbed locally into degraded values and surfaced through
/// logs, so most of these variants appear during setup and ingestion rather
/// than per-request.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector index error ({backend}): {message}")]
    VectorIndexError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An existing collection has a different dimensionality than requested.
    #[error(
        "Dimension mismatch on collection '{collection}': existing {existing}, requested {requested}"
    )]
    DimensionMismatch {
        /// The collection name.
        collection: String,
        /// Dimensionality of the existing collection.
        existing: usize,
        /// Dimensionality requested by the caller.
        requested: usize,
    },

    /// An error occurred in a generation backend.
    #[error("Generation error ({backend}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
