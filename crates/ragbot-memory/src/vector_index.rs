use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("index API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("index already exists: {0}")]
    IndexExists(String),
    #[error("index {0} did not become ready in time")]
    NotReady(String),
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Similarity metric an index is created with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

impl Metric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dotproduct => "dotproduct",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create a serverless index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub cloud: String,
    pub region: String,
}

/// An existing index as reported by the backend. Fields a backend cannot report are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: Option<usize>,
    pub metric: Option<Metric>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl QueryMatch {
    /// String metadata value for `key`, if present and a string.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A named-index vector database: create once, upsert, nearest-neighbor query.
pub trait VectorIndex: Send + Sync {
    fn list_indexes(&self) -> BoxFuture<'_, Result<Vec<IndexDescription>, VectorIndexError>>;

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorIndexError>>;

    /// Insert or overwrite records by id. Returns the number of records written.
    fn upsert(
        &self,
        index: &str,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<usize, VectorIndexError>>;

    /// Return up to `top_k` matches ordered by descending similarity, with metadata.
    fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<QueryMatch>, VectorIndexError>>;

    fn index_exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, VectorIndexError>> {
        Box::pin(async move {
            Ok(self
                .list_indexes()
                .await?
                .iter()
                .any(|index| index.name == name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Metric::Dotproduct).unwrap(),
            "\"dotproduct\""
        );
        let parsed: Metric = serde_json::from_str("\"cosine\"").unwrap();
        assert_eq!(parsed, Metric::Cosine);
        assert_eq!(Metric::default(), Metric::Cosine);
    }

    #[test]
    fn metadata_str_reads_strings_only() {
        let m = QueryMatch {
            id: "id-0".into(),
            score: 0.9,
            metadata: HashMap::from([
                ("text".to_owned(), serde_json::json!("chunk")),
                ("page".to_owned(), serde_json::json!(3)),
            ]),
        };
        assert_eq!(m.metadata_str("text"), Some("chunk"));
        assert_eq!(m.metadata_str("page"), None);
        assert_eq!(m.metadata_str("missing"), None);
    }
}
