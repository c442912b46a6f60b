//! Embedding provider trait and the soft-fail embedder wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::Result;
use crate::normalize::normalize_arabic;

/// Which side of an asymmetric retrieval model a text belongs to.
///
/// E5-family models are trained with distinct `query:` / `passage:`
/// instruction prefixes. The kind used when a passage was ingested must match
/// the kind used at query time; mixing them degrades retrieval silently, so
/// the kind is threaded through every embedding call rather than configured
/// once and forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    /// A question being used to search the index.
    Query,
    /// A passage being written into the index.
    Passage,
}

impl EmbedKind {
    /// The E5-style instruction prefix for this kind.
    ///
    /// Harmless for models that were not trained with prefixes.
    pub fn prefix(self) -> &'static str {
        match self {
            EmbedKind::Query => "query: ",
            EmbedKind::Passage => "passage: ",
        }
    }
}

/// A backend that turns text into fixed-length unit-normalized vectors.
///
/// Implementations wrap a specific embedding service behind a unified async
/// interface. Inputs arrive already normalized and prefixed; backends only
/// encode. The default [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends with native
/// batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Must return exactly `texts.len()` vectors in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Normalizing, soft-failing front end over an [`EmbeddingProvider`].
///
/// Every text is canonicalized with [`normalize_arabic`] and prefixed for
/// its [`EmbedKind`] before encoding. Batch calls never abort as a whole: a
/// failed batch degrades to zero-length placeholder vectors, one per input,
/// so callers keep positional alignment with their payload lists and can
/// skip the bad entries.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Embedder {
    /// Wrap an embedding provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Embed a single text, normalized and prefixed for `kind`.
    ///
    /// Degrades to an empty vector on provider failure; the failure is
    /// logged, never propagated.
    pub async fn embed(&self, kind: EmbedKind, text: &str) -> Vec<f32> {
        let prepared = format!("{}{}", kind.prefix(), normalize_arabic(text));
        match self.provider.embed(&prepared).await {
            Ok(vector) => vector,
            Err(e) => {
                error!(error = %e, "embedding failed, returning empty vector");
                Vec::new()
            }
        }
    }

    /// Embed a batch, normalized and prefixed for `kind`.
    ///
    /// Always returns `texts.len()` vectors in input order. On provider
    /// failure every slot is a zero-length placeholder.
    pub async fn embed_batch(&self, kind: EmbedKind, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        let prepared: Vec<String> =
            texts.iter().map(|t| format!("{}{}", kind.prefix(), normalize_arabic(t))).collect();
        let refs: Vec<&str> = prepared.iter().map(String::as_str).collect();

        match self.provider.embed_batch(&refs).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors,
            Ok(vectors) => {
                error!(
                    expected = texts.len(),
                    got = vectors.len(),
                    "provider broke the batch length invariant, returning placeholders"
                );
                vec![Vec::new(); texts.len()]
            }
            Err(e) => {
                error!(error = %e, batch_size = texts.len(), "batch embedding failed");
                vec![Vec::new(); texts.len()]
            }
        }
    }

    /// Discover the vector dimensionality by embedding a probe string.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the probe call fails; dimensionality
    /// is needed for collection setup, so this one is not soft.
    pub async fn probe_dimension(&self) -> Result<usize> {
        let prepared = format!("{}مثال", EmbedKind::Passage.prefix());
        let vector = self.provider.embed(&prepared).await?;
        debug!(dimension = vector.len(), "probed embedding dimension");
        Ok(vector.len())
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Provider returning a fixed zero vector, for wiring-only tests.
    pub(crate) struct ZeroProvider;

    #[async_trait]
    impl EmbeddingProvider for ZeroProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0, 0.0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    /// Deterministic provider for tests: fails on texts containing "فشل".
    struct FlakyProvider;

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("فشل") {
                return Err(RagError::EmbeddingError {
                    provider: "flaky".into(),
                    message: "simulated".into(),
                });
            }
            Ok(vec![1.0, 0.0])
        }
    }

    #[tokio::test]
    async fn batch_length_invariant_holds_on_failure() {
        let embedder = Embedder::new(Arc::new(FlakyProvider));
        let texts = vec!["سلام".to_string(), "فشل".to_string(), "".to_string()];
        let vectors = embedder.embed_batch(EmbedKind::Passage, &texts).await;
        assert_eq!(vectors.len(), texts.len());
        // Sequential default: the failing item poisons the whole batch into
        // placeholders rather than losing alignment.
        assert!(vectors.iter().all(Vec::is_empty));
    }

    #[tokio::test]
    async fn single_failure_degrades_to_empty() {
        let embedder = Embedder::new(Arc::new(FlakyProvider));
        assert!(embedder.embed(EmbedKind::Query, "فشل").await.is_empty());
        assert_eq!(embedder.embed(EmbedKind::Query, "سلام").await.len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty() {
        let embedder = Embedder::new(Arc::new(FlakyProvider));
        assert!(embedder.embed_batch(EmbedKind::Passage, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn probe_reports_dimension() {
        let embedder = Embedder::new(Arc::new(FlakyProvider));
        assert_eq!(embedder.probe_dimension().await.unwrap(), 2);
    }
}
