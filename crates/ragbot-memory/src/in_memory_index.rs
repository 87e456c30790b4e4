use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::vector_index::{
    BoxFuture, IndexDescription, IndexSpec, Metric, QueryMatch, VectorIndex, VectorIndexError,
    VectorRecord,
};

struct StoredRecord {
    values: Vec<f32>,
    metadata: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    spec: IndexSpec,
    records: BTreeMap<String, StoredRecord>,
}

/// Process-local index for tests and offline runs. Query is a brute-force scan.
pub struct InMemoryIndex {
    indexes: RwLock<HashMap<String, InMemoryCollection>>,
    upsert_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            upsert_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `upsert` calls received so far.
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::Relaxed)
    }

    /// Number of successful `create_index` calls received so far.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// Ids stored in `index`, sorted. Empty when the index does not exist.
    #[must_use]
    pub fn record_ids(&self, index: &str) -> Vec<String> {
        self.indexes
            .read()
            .map(|indexes| {
                indexes
                    .get(index)
                    .map(|c| c.records.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Higher is more similar for every metric, so euclidean distance is negated.
fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::Dotproduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        Metric::Euclidean => -a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

fn poisoned(e: impl std::fmt::Display) -> VectorIndexError {
    VectorIndexError::Backend(format!("in-memory index lock poisoned: {e}"))
}

impl VectorIndex for InMemoryIndex {
    fn list_indexes(&self) -> BoxFuture<'_, Result<Vec<IndexDescription>, VectorIndexError>> {
        Box::pin(async move {
            let indexes = self.indexes.read().map_err(poisoned)?;
            let mut out: Vec<IndexDescription> = indexes
                .values()
                .map(|c| IndexDescription {
                    name: c.spec.name.clone(),
                    dimension: Some(c.spec.dimension),
                    metric: Some(c.spec.metric),
                    host: None,
                })
                .collect();
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorIndexError>> {
        let spec = spec.clone();
        Box::pin(async move {
            let mut indexes = self.indexes.write().map_err(poisoned)?;
            if indexes.contains_key(&spec.name) {
                return Err(VectorIndexError::IndexExists(spec.name));
            }
            indexes.insert(
                spec.name.clone(),
                InMemoryCollection {
                    spec,
                    records: BTreeMap::new(),
                },
            );
            self.create_calls.fetch_add(1, Ordering::Relaxed);
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
            self.upsert_calls.fetch_add(1, Ordering::Relaxed);
            let mut indexes = self.indexes.write().map_err(poisoned)?;
            let collection = indexes
                .get_mut(&index)
                .ok_or(VectorIndexError::IndexNotFound(index))?;
            let expected = collection.spec.dimension;
            if let Some(bad) = records.iter().find(|r| r.values.len() != expected) {
                return Err(VectorIndexError::DimensionMismatch {
                    expected,
                    actual: bad.values.len(),
                });
            }
            let count = records.len();
            for record in records {
                collection.records.insert(
                    record.id,
                    StoredRecord {
                        values: record.values,
                        metadata: record.metadata,
                    },
                );
            }
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
            let indexes = self.indexes.read().map_err(poisoned)?;
            let collection = indexes
                .get(&index)
                .ok_or(VectorIndexError::IndexNotFound(index))?;
            if vector.len() != collection.spec.dimension {
                return Err(VectorIndexError::DimensionMismatch {
                    expected: collection.spec.dimension,
                    actual: vector.len(),
                });
            }
            let metric = collection.spec.metric;
            let mut matches: Vec<QueryMatch> = collection
                .records
                .iter()
                .map(|(id, record)| QueryMatch {
                    id: id.clone(),
                    score: score(metric, &vector, &record.values),
                    metadata: record.metadata.clone(),
                })
                .collect();
            matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
            matches.truncate(top_k);
            Ok(matches)
        })
    }
}
