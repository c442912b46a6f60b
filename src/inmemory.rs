//! In-memory vector index using cosine similarity.
//!
//! A zero-dependency [`VectorIndex`] backed by a `HashMap` behind a
//! `tokio::sync::RwLock`. Suitable for development and tests; it honors the
//! same degraded-search contract as the remote backends.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::document::ScoredPoint;
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexPoint, PointId, VectorIndex};

struct Collection {
    dim: usize,
    points: HashMap<PointId, IndexPoint>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use bosala_rag::{InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new();
/// index.ensure_collection("contexts", 384).await?;
/// ```
#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection, for tests and diagnostics.
    pub async fn len(&self, name: &str) -> usize {
        self.collections.read().await.get(name).map_or(0, |c| c.points.len())
    }

    /// Whether a collection holds no points (or does not exist).
    pub async fn is_empty(&self, name: &str) -> bool {
        self.len(name).await == 0
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) if existing.dim != dim => Err(RagError::DimensionMismatch {
                collection: name.to_string(),
                existing: existing.dim,
                requested: dim,
            }),
            Some(_) => Ok(()),
            None => {
                collections
                    .insert(name.to_string(), Collection { dim, points: HashMap::new() });
                debug!(collection = name, dim, "created in-memory collection");
                Ok(())
            }
        }
    }

    async fn recreate(&self, name: &str, dim: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.insert(name.to_string(), Collection { dim, points: HashMap::new() });
        debug!(collection = name, dim, "recreated in-memory collection");
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let mut collections = self.collections.write().await;
        let collection =
            collections.get_mut(name).ok_or_else(|| RagError::VectorIndexError {
                backend: "inmemory".to_string(),
                message: format!("collection '{name}' does not exist"),
            })?;
        for point in points {
            collection.points.insert(point.id.clone(), point);
        }
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(name) else {
            // Degraded path: missing collection answers with no hits.
            error!(collection = name, "search against missing collection, returning no hits");
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredPoint> = collection
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id.to_string(),
                score: cosine_similarity(&point.vector, vector),
                payload: point.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}
