//! Qdrant-backed [`VectorIndex`], for self-hosted deployments.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder, value::Kind,
};
use uuid::Uuid;

use crate::vector_index::{
    BoxFuture, IndexDescription, IndexSpec, Metric, QueryMatch, VectorIndex, VectorIndexError,
    VectorRecord,
};

/// Payload key holding the caller's record id; Qdrant point ids must be UUIDs or integers.
const RECORD_ID_KEY: &str = "record_id";

#[derive(Clone)]
pub struct QdrantIndex {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex").finish_non_exhaustive()
    }
}

impl QdrantIndex {
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str) -> Result<Self, VectorIndexError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorIndexError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

fn backend(e: qdrant_client::QdrantError) -> VectorIndexError {
    VectorIndexError::Backend(e.to_string())
}

fn distance(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::Euclidean => Distance::Euclid,
        Metric::Dotproduct => Distance::Dot,
    }
}

/// Stable point id derived from the record id, so re-upserting `id-3` overwrites it.
fn point_id(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

fn record_to_point(record: VectorRecord) -> Result<PointStruct, VectorIndexError> {
    let mut metadata = record.metadata;
    metadata.insert(
        RECORD_ID_KEY.to_owned(),
        serde_json::Value::String(record.id.clone()),
    );
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::Value::Object(metadata.into_iter().collect()))
            .map_err(|e| VectorIndexError::Serialization(e.to_string()))?;
    Ok(PointStruct::new(point_id(&record.id), record.values, payload))
}

fn scored_point_to_match(point: ScoredPoint) -> QueryMatch {
    let mut metadata: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match metadata.remove(RECORD_ID_KEY) {
        Some(serde_json::Value::String(id)) => id,
        _ => match point.id.and_then(|pid| pid.point_id_options) {
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
            None => String::new(),
        },
    };

    QueryMatch {
        id,
        score: point.score,
        metadata,
    }
}

impl VectorIndex for QdrantIndex {
    fn list_indexes(&self) -> BoxFuture<'_, Result<Vec<IndexDescription>, VectorIndexError>> {
        Box::pin(async move {
            let response = self.client.list_collections().await.map_err(backend)?;
            Ok(response
                .collections
                .into_iter()
                .map(|c| IndexDescription {
                    name: c.name,
                    dimension: None,
                    metric: None,
                    host: None,
                })
                .collect())
        })
    }

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorIndexError>> {
        let spec = spec.clone();
        Box::pin(async move {
            if self
                .client
                .collection_exists(&spec.name)
                .await
                .map_err(backend)?
            {
                return Err(VectorIndexError::IndexExists(spec.name));
            }
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(spec.name.clone()).vectors_config(
                        VectorParamsBuilder::new(spec.dimension as u64, distance(spec.metric)),
                    ),
                )
                .await
                .map_err(backend)?;
            tracing::info!(collection = %spec.name, dimension = spec.dimension, "created Qdrant collection");
            Ok(())
        })
    }

    fn upsert(
        &self,
        index: &str,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<usize, VectorIndexError>> {
        let index = index.to_owned();
        Box::pin(async move {
            let points = records
                .into_iter()
                .map(record_to_point)
                .collect::<Result<Vec<_>, _>>()?;
            let count = points.len();
            self.client
                .upsert_points(UpsertPointsBuilder::new(index, points).wait(true))
                .await
                .map_err(backend)?;
            Ok(count)
        })
    }

    fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>, VectorIndexError>> {
        let index = index.to_owned();
        Box::pin(async move {
            let response = self
                .client
                .search_points(
                    SearchPointsBuilder::new(index, vector, top_k as u64).with_payload(true),
                )
                .await
                .map_err(backend)?;
            Ok(response
                .result
                .into_iter()
                .map(scored_point_to_match)
                .collect())
        })
    }
}
