//! Question-side retrieval: embed, search, map payloads to contexts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::RetrievedContext;
use crate::embedding::{EmbedKind, Embedder};
use crate::normalize::normalize_arabic;
use crate::vectorstore::VectorIndex;

/// Retrieves ranked context records for a question.
///
/// Composes the [`Embedder`] and a [`VectorIndex`]: the question is
/// normalized, embedded as a query, and searched against a single named
/// collection. Hits whose payload resolves to no usable text are dropped, so
/// the returned sequence can be shorter than `top_k`.
///
/// An optional cache keyed by the normalized question avoids re-embedding
/// repeated identical questions within the process lifetime. Entries never
/// expire; a deployment that cares about index churn disables the cache.
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    collection: String,
    top_k: usize,
    cache: Option<RwLock<HashMap<String, Vec<RetrievedContext>>>>,
}

impl Retriever {
    /// Create a retriever over `collection` returning up to `top_k` contexts.
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        top_k: usize,
        cache_enabled: bool,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            top_k: top_k.max(1),
            cache: cache_enabled.then(|| RwLock::new(HashMap::new())),
        }
    }

    /// Retrieve ranked contexts for a question.
    ///
    /// Never fails: embedding or search trouble degrades to an empty result
    /// (logged upstream), and the caller decides what an empty context set
    /// means.
    pub async fn retrieve(&self, question: &str) -> Vec<RetrievedContext> {
        let normalized = normalize_arabic(question);
        if normalized.is_empty() {
            return Vec::new();
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.read().await.get(&normalized) {
                debug!(question = %normalized, "retriever cache hit");
                return hit.clone();
            }
        }

        let query_vector = self.embedder.embed(EmbedKind::Query, &normalized).await;
        if query_vector.is_empty() {
            warn!("query embedding unavailable, retrieval degrades to no contexts");
            return Vec::new();
        }

        let hits = self
            .index
            .search(&self.collection, &query_vector, self.top_k)
            .await
            .unwrap_or_default();

        let contexts: Vec<RetrievedContext> = hits
            .into_iter()
            .filter_map(|hit| {
                let text = hit.payload.best_text()?.to_string();
                Some(RetrievedContext {
                    score: hit.score,
                    text,
                    doc_id: hit.payload.doc_id,
                    chunk_index: hit.payload.chunk_index,
                    question: hit.payload.question,
                    answer: hit.payload.answer_text,
                })
            })
            .collect();

        debug!(
            collection = %self.collection,
            count = contexts.len(),
            "retrieved contexts"
        );

        if let Some(cache) = &self.cache {
            cache.write().await.insert(normalized, contexts.clone());
        }

        contexts
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::document::PointPayload;
    use crate::embedding::EmbeddingProvider;
    use crate::error::Result;
    use crate::inmemory::InMemoryIndex;
    use crate::vectorstore::{IndexPoint, PointId, VectorIndex};

    /// Counts calls so cache behavior is observable.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }
    }

    async fn seeded_index() -> Arc<InMemoryIndex> {
        let index = Arc::new(InMemoryIndex::new());
        index.ensure_collection("contexts", 2).await.unwrap();
        index
            .upsert(
                "contexts",
                vec![
                    IndexPoint {
                        id: PointId::Seq(0),
                        vector: vec![1.0, 0.0],
                        payload: PointPayload {
                            context_text: Some("القدس هي عاصمة فلسطين".into()),
                            doc_id: Some("d0".into()),
                            chunk_index: Some(0),
                            question: Some("ما هي عاصمة فلسطين؟".into()),
                            answer_text: Some("القدس".into()),
                            ..Default::default()
                        },
                    },
                    IndexPoint {
                        id: PointId::Seq(1),
                        vector: vec![0.9, 0.1],
                        payload: PointPayload {
                            // Only the legacy raw-context field is set.
                            raw_context: Some("سياق خام".into()),
                            ..Default::default()
                        },
                    },
                    IndexPoint {
                        id: PointId::Seq(2),
                        vector: vec![0.8, 0.2],
                        payload: PointPayload::default(),
                    },
                ],
            )
            .await
            .unwrap();
        index
    }

    fn retriever(index: Arc<InMemoryIndex>, cache: bool) -> (Retriever, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0) });
        let embedder = Embedder::new(provider.clone());
        (Retriever::new(embedder, index, "contexts", 5, cache), provider)
    }

    #[tokio::test]
    async fn maps_payloads_with_priority_and_drops_textless_hits() {
        let index = seeded_index().await;
        let (retriever, _) = retriever(index, false);
        let contexts = retriever.retrieve("ما هي عاصمة فلسطين؟").await;
        // Three stored points, one with no usable text.
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].text, "القدس هي عاصمة فلسطين");
        assert_eq!(contexts[0].doc_id.as_deref(), Some("d0"));
        assert_eq!(contexts[1].text, "سياق خام");
    }

    #[tokio::test]
    async fn carries_question_and_answer_provenance() {
        let index = seeded_index().await;
        let (retriever, _) = retriever(index, false);
        let contexts = retriever.retrieve("ما هي عاصمة فلسطين؟").await;
        // The gold answer rides along even when the chunk text is what was
        // embedded and retrieved.
        assert_eq!(contexts[0].question.as_deref(), Some("ما هي عاصمة فلسطين؟"));
        assert_eq!(contexts[0].answer.as_deref(), Some("القدس"));
        assert_eq!(contexts[1].answer, None);
    }

    #[tokio::test]
    async fn cache_avoids_repeat_embedding() {
        let index = seeded_index().await;
        let (retriever, provider) = retriever(index, true);
        // Same question in two surface forms normalizing identically.
        retriever.retrieve("ما هي عاصمة فلسطين؟").await;
        retriever.retrieve("  ما هي عاصمة فلسطين؟ ").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_question_retrieves_nothing() {
        let index = seeded_index().await;
        let (retriever, provider) = retriever(index, false);
        assert!(retriever.retrieve("   ").await.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_collection_degrades_to_empty() {
        let index = Arc::new(InMemoryIndex::new());
        let (retriever, _) = retriever(index, false);
        assert!(retriever.retrieve("سؤال").await.is_empty());
    }
}
