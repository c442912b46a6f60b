//! Qdrant vector index backend.
//!
//! Provides [`QdrantIndex`] which implements [`VectorIndex`] using the
//! [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! This module is only available when the `qdrant` feature is enabled.

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, error};

use crate::document::{PointPayload, ScoredPoint};
use crate::error::{RagError, Result};
use crate::vectorstore::{IndexPoint, PointId, VectorIndex};

/// Default gRPC endpoint of a local Qdrant instance.
const DEFAULT_URL: &str = "http://localhost:6334";

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
///
/// Collections are created with cosine distance. Payloads are stored as flat
/// Qdrant payload fields so other ingestion jobs (and humans in the Qdrant
/// console) can read them without this crate's types.
pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    /// Connect to a Qdrant instance at the given URL, optionally with an API key.
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Connect using the `QDRANT_URL` and `QDRANT_API_KEY` environment
    /// variables, defaulting to a local instance with no key.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("QDRANT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var("QDRANT_API_KEY").ok();
        Self::new(&url, api_key.as_deref())
    }

    /// Wrap an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorIndexError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Look up the vector dimensionality of an existing collection.
    async fn existing_dimension(&self, name: &str) -> Result<Option<usize>> {
        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        let dim = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                VectorsConfigKind::Params(params) => Some(params.size as usize),
                VectorsConfigKind::ParamsMap(_) => None,
            });
        Ok(dim)
    }

    async fn create(&self, name: &str, dim: usize) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;
        debug!(collection = name, dim, "created qdrant collection");
        Ok(())
    }

    fn to_point_struct(point: IndexPoint) -> PointStruct {
        let payload_json =
            serde_json::to_value(&point.payload).unwrap_or(serde_json::Value::Null);
        let payload = Payload::try_from(payload_json).unwrap_or_default();
        match point.id {
            PointId::Seq(n) => PointStruct::new(n, point.vector, payload),
            PointId::Content(id) => PointStruct::new(id, point.vector, payload),
        }
    }

    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_usize(value: &QdrantValue) -> Option<usize> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) if *n >= 0 => Some(*n as usize),
            _ => None,
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        let exists = collections.collections.iter().any(|c| c.name == name);
        if !exists {
            return self.create(name, dim).await;
        }

        // Existing collection with a different dimensionality would accept
        // upserts and then fail at search time; refuse it up front.
        if let Some(existing) = self.existing_dimension(name).await? {
            if existing != dim {
                return Err(RagError::DimensionMismatch {
                    collection: name.to_string(),
                    existing,
                    requested: dim,
                });
            }
        }
        debug!(collection = name, "qdrant collection already exists");
        Ok(())
    }

    async fn recreate(&self, name: &str, dim: usize) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        if collections.collections.iter().any(|c| c.name == name) {
            self.client.delete_collection(name).await.map_err(Self::map_err)?;
            debug!(collection = name, "dropped qdrant collection");
        }
        self.create(name, dim).await
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let count = points.len();
        let points: Vec<PointStruct> = points.into_iter().map(Self::to_point_struct).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, count, "upserted points to qdrant");
        Ok(())
    }

    async fn search(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredPoint>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, vector.to_vec(), top_k as u64).with_payload(true),
            )
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                // Degraded path: retrieval keeps answering with no hits, the
                // operator sees the failure in the log.
                error!(collection = name, error = %e, "qdrant search failed, returning no hits");
                return Ok(Vec::new());
            }
        };

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .id
                    .as_ref()
                    .and_then(|pid| match &pid.point_id_options {
                        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
                        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
                        None => None,
                    })
                    .unwrap_or_default();

                let get_str =
                    |key: &str| scored.payload.get(key).and_then(Self::extract_string);

                let payload = PointPayload {
                    doc_id: get_str("doc_id"),
                    chunk_index: scored.payload.get("chunk_index").and_then(Self::extract_usize),
                    context_text: get_str("context_text"),
                    raw_context: get_str("raw_context"),
                    answer_text: get_str("answer_text"),
                    question: get_str("question"),
                    source: get_str("source"),
                };

                ScoredPoint { id, score: scored.score, payload }
            })
            .collect();

        Ok(results)
    }
}
