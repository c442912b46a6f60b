//! Vector index trait and point id strategies.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::document::{PointPayload, ScoredPoint};
use crate::error::{RagError, Result};
use crate::normalize::normalize_arabic;

/// Identifier for a stored point.
///
/// Two strategies coexist: sequential ids for bulk corpus loads (deterministic
/// from a job's `start_id` plus offset) and content-derived ids for single
/// ingestion, where re-ingesting identical text must overwrite rather than
/// duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointId {
    /// Sequential numeric id (`start_id + offset`).
    Seq(u64),
    /// Stable content-derived id in UUID shape.
    Content(String),
}

impl PointId {
    /// Derive a stable id from normalized text.
    ///
    /// The SHA-256 hex digest is folded into UUID 8-4-4-4-12 shape because
    /// the index service accepts UUIDs or integers as point ids, not
    /// arbitrary 64-char hex strings.
    pub fn from_content(text: &str) -> Self {
        let normalized = normalize_arabic(text);
        let digest = Sha256::digest(normalized.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        PointId::Content(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32],
        ))
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Seq(n) => write!(f, "{n}"),
            PointId::Content(s) => write!(f, "{s}"),
        }
    }
}

/// A point ready for upsert: id, vector, and denormalized payload.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    /// The point id.
    pub id: PointId,
    /// The embedding vector.
    pub vector: Vec<f32>,
    /// The stored payload.
    pub payload: PointPayload,
}

/// Zip vectors and payloads into sequential-id points.
///
/// Ids are `start_id + offset`, matching the bulk ingestion convention.
///
/// # Errors
///
/// Returns [`RagError::PipelineError`] when the two lists differ in length;
/// a partial insert with misaligned payloads is worse than no insert.
pub fn sequential_points(
    vectors: Vec<Vec<f32>>,
    payloads: Vec<PointPayload>,
    start_id: u64,
) -> Result<Vec<IndexPoint>> {
    if vectors.len() != payloads.len() {
        return Err(RagError::PipelineError(format!(
            "vectors/payloads length mismatch: {} != {}",
            vectors.len(),
            payloads.len()
        )));
    }
    Ok(vectors
        .into_iter()
        .zip(payloads)
        .enumerate()
        .map(|(offset, (vector, payload))| IndexPoint {
            id: PointId::Seq(start_id + offset as u64),
            vector,
            payload,
        })
        .collect())
}

/// A named-collection vector similarity index.
///
/// Implementations wrap an external similarity-search service. Search is a
/// degraded-path operation: an empty or unreachable collection yields an
/// empty result set (logged, not raised) so retrieval keeps responding.
/// Administrative operations (`ensure_collection`, `recreate`) are hard
/// failures because they run at setup time where a broken index must stop
/// the process.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection with cosine similarity if absent; no-op when it
    /// already exists with the same dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] when the collection exists
    /// with a different dimensionality. That is a configuration error, not a
    /// condition to paper over.
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()>;

    /// Drop and recreate the collection unconditionally. Destructive; used
    /// for full reindexing and must not run concurrently with itself.
    async fn recreate(&self, name: &str, dim: usize) -> Result<()>;

    /// Insert or replace points. Upserting an existing id replaces its
    /// vector and payload.
    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()>;

    /// Return up to `top_k` nearest points by descending similarity.
    ///
    /// Empty, missing, or unreachable collections yield `Ok(vec![])`; the
    /// failure is logged by the implementation.
    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredPoint>>;
}
