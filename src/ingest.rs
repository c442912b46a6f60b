//! Ingestion entry points: bulk corpus loads and idempotent single-text ingestion.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunking::SentenceChunker;
use crate::config::RagConfig;
use crate::document::{Document, PointPayload};
use crate::embedding::{EmbedKind, Embedder};
use crate::error::{RagError, Result};
use crate::normalize::normalize_arabic;
use crate::vectorstore::{IndexPoint, PointId, VectorIndex, sequential_points};

/// Result of a single-text ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// The content-derived point id. Identical normalized text always maps
    /// to the same id.
    pub id: String,
    /// The normalized text as stored.
    pub text: String,
}

/// Writes documents into a vector index collection.
///
/// Two paths mirror the two id strategies: [`ingest_text`](Ingestor::ingest_text)
/// uses content-derived ids so user-submitted text is idempotent, and
/// [`ingest_documents`](Ingestor::ingest_documents) uses sequential ids for
/// bulk corpus jobs where positional determinism matters.
pub struct Ingestor {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    chunker: SentenceChunker,
}

impl Ingestor {
    /// Create an ingestor over the given embedder and index.
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>, chunker: SentenceChunker) -> Self {
        Self { embedder, index, chunker }
    }

    /// Create an ingestor whose chunker uses the configured sentence group
    /// size, so ingestion and the rest of the pipeline read one config.
    pub fn from_config(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        config: &RagConfig,
    ) -> Self {
        Self::new(embedder, index, SentenceChunker::new(config.group_size))
    }

    /// Probe the embedding dimension and prepare a collection.
    ///
    /// With `force` the collection is dropped and recreated (destructive,
    /// single-job only); otherwise it is created if absent and verified
    /// against the probed dimension.
    pub async fn prepare_collection(&self, collection: &str, force: bool) -> Result<usize> {
        let dim = self.embedder.probe_dimension().await?;
        if force {
            info!(collection, dim, "recreating collection");
            self.index.recreate(collection, dim).await?;
        } else {
            info!(collection, dim, "ensuring collection exists");
            self.index.ensure_collection(collection, dim).await?;
        }
        Ok(dim)
    }

    /// Normalize, hash, embed, and upsert a single piece of text.
    ///
    /// Re-ingesting identical text (up to normalization) overwrites the same
    /// point rather than adding a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for empty input and
    /// [`RagError::EmbeddingError`] when the embedding comes back unusable;
    /// ingestion is a deliberate operator action, so unlike the query path it
    /// fails loudly.
    pub async fn ingest_text(&self, collection: &str, text: &str) -> Result<IngestReceipt> {
        let clean = normalize_arabic(text);
        if clean.is_empty() {
            return Err(RagError::ConfigError("cannot ingest empty text".into()));
        }

        let id = PointId::from_content(&clean);
        let vector = self.embedder.embed(EmbedKind::Passage, &clean).await;
        if vector.is_empty() {
            return Err(RagError::EmbeddingError {
                provider: "ingest".into(),
                message: "embedding unavailable for ingested text".into(),
            });
        }

        let payload = PointPayload {
            context_text: Some(clean.clone()),
            raw_context: Some(clean.clone()),
            source: Some("user_ingest".into()),
            ..Default::default()
        };

        let id_string = id.to_string();
        self.index
            .upsert(collection, vec![IndexPoint { id, vector, payload }])
            .await?;

        info!(collection, id = %id_string, "ingested text");
        Ok(IngestReceipt { id: id_string, text: clean })
    }

    /// Chunk, embed, and upsert a batch of documents with sequential ids
    /// starting at `start_id`.
    ///
    /// Chunks whose embedding degraded to a placeholder are skipped (their
    /// sequential id is still consumed, keeping ids stable across retries).
    /// Returns the number of points actually written.
    pub async fn ingest_documents(
        &self,
        collection: &str,
        documents: &[Document],
        start_id: u64,
    ) -> Result<usize> {
        let mut texts = Vec::new();
        let mut payloads = Vec::new();

        for document in documents {
            let raw_context = normalize_arabic(&document.text);
            for chunk in self.chunker.chunk(document) {
                payloads.push(PointPayload {
                    doc_id: Some(document.id.clone()),
                    chunk_index: Some(chunk.index),
                    context_text: Some(chunk.text.clone()),
                    raw_context: Some(raw_context.clone()),
                    answer_text: document.answer.clone(),
                    question: document.question.clone(),
                    source: document.source.clone(),
                });
                texts.push(chunk.text);
            }
        }

        if texts.is_empty() {
            info!(collection, "no chunks to ingest");
            return Ok(0);
        }

        let vectors = self.embedder.embed_batch(EmbedKind::Passage, &texts).await;
        let points: Vec<IndexPoint> = sequential_points(vectors, payloads, start_id)?
            .into_iter()
            .filter(|point| {
                if point.vector.is_empty() {
                    warn!(id = %point.id, "skipping chunk with degraded embedding");
                    return false;
                }
                true
            })
            .collect();

        let written = points.len();
        self.index.upsert(collection, points).await?;
        info!(collection, chunks = texts.len(), written, "ingested documents");
        Ok(written)
    }
}
