use std::path::Path;
use std::sync::Arc;

use ragbot_llm::EmbedBatchFuture;
use serde_json::Value;

use super::{
    Chunk, Document, DocumentError, DocumentLoader, IngestReport, TextSplitter, load_directory,
};
use crate::vector_index::{IndexSpec, VectorIndex, VectorIndexError, VectorRecord};

/// Metadata key holding the chunk text; retrieval reads the context back from it.
pub const TEXT_KEY: &str = "text";
pub const SOURCE_KEY: &str = "source";
pub const PAGE_KEY: &str = "page";

/// Default number of records per upsert request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub type EmbedBatchFn = Box<dyn Fn(Vec<String>) -> EmbedBatchFuture + Send + Sync>;

/// Id of the chunk at `offset` within one ingestion run.
#[must_use]
pub fn record_id(offset: usize) -> String {
    format!("id-{offset}")
}

fn chunk_metadata(chunk: &Chunk) -> std::collections::HashMap<String, Value> {
    let mut metadata = std::collections::HashMap::from([
        (TEXT_KEY.to_owned(), Value::String(chunk.content.clone())),
        (
            SOURCE_KEY.to_owned(),
            Value::String(chunk.metadata.source.clone()),
        ),
    ]);
    if let Some(page) = chunk.metadata.page() {
        metadata.insert(PAGE_KEY.to_owned(), Value::from(page));
    }
    metadata
}

/// Split, embed and upsert documents into one named index.
pub struct IngestionPipeline {
    splitter: TextSplitter,
    index: Arc<dyn VectorIndex>,
    spec: IndexSpec,
    batch_size: usize,
    embed_fn: EmbedBatchFn,
}

impl IngestionPipeline {
    pub fn new(
        splitter: TextSplitter,
        index: Arc<dyn VectorIndex>,
        spec: IndexSpec,
        embed_fn: EmbedBatchFn,
    ) -> Self {
        Self {
            splitter,
            index,
            spec,
            batch_size: DEFAULT_BATCH_SIZE,
            embed_fn,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.spec.name
    }

    /// Create the index unless one with the same name already exists.
    /// Returns `true` when this call created it.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or creating the index fails, or if the existing index
    /// reports a dimension different from the configured one.
    pub async fn ensure_index(&self) -> Result<bool, DocumentError> {
        let existing = self
            .index
            .list_indexes()
            .await?
            .into_iter()
            .find(|index| index.name == self.spec.name);
        if let Some(existing) = existing {
            if let Some(dimension) = existing.dimension
                && dimension != self.spec.dimension
            {
                return Err(DocumentError::IndexDimension {
                    index: existing.name,
                    existing: dimension,
                    configured: self.spec.dimension,
                });
            }
            tracing::info!(
                index = %self.spec.name,
                host = existing.host.as_deref().unwrap_or("-"),
                "index already exists, reusing it"
            );
            return Ok(false);
        }
        match self.index.create_index(&self.spec).await {
            Ok(()) => {
                tracing::info!(
                    index = %self.spec.name,
                    dimension = self.spec.dimension,
                    metric = %self.spec.metric,
                    cloud = %self.spec.cloud,
                    region = %self.spec.region,
                    "created index"
                );
                Ok(true)
            }
            Err(VectorIndexError::IndexExists(_)) => {
                tracing::info!(index = %self.spec.name, "index was created concurrently, reusing it");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ingest already loaded documents: split, ensure the index, embed every chunk in one
    /// call and upsert in batches with ids `id-0..id-(N-1)`.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails, returns the wrong number or size of vectors,
    /// or any index call fails. Batches upserted before the failure stay committed.
    pub async fn ingest_documents(
        &self,
        documents: &[Document],
    ) -> Result<IngestReport, DocumentError> {
        let chunks = self.splitter.split_documents(documents);
        tracing::info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "split documents"
        );

        let created_index = self.ensure_index().await?;
        let mut report = IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            batches: 0,
            created_index,
        };
        if chunks.is_empty() {
            tracing::warn!("no text extracted, nothing to upsert");
            return Ok(report);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = (self.embed_fn)(texts).await?;
        if vectors.len() != chunks.len() {
            return Err(DocumentError::EmbeddingCount {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.spec.dimension) {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.spec.dimension,
                actual: bad.len(),
            }
            .into());
        }

        let mut records = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(offset, (chunk, values))| VectorRecord {
                id: record_id(offset),
                values,
                metadata: chunk_metadata(chunk),
            })
            .peekable();

        let mut offset = 0;
        while records.peek().is_some() {
            let batch: Vec<VectorRecord> = records.by_ref().take(self.batch_size).collect();
            let len = batch.len();
            let written = self.index.upsert(&self.spec.name, batch).await?;
            report.batches += 1;
            tracing::debug!(
                batch = report.batches,
                from = offset,
                to = offset + len,
                written,
                "upserted batch"
            );
            offset += len;
        }

        tracing::debug!(index = %self.spec.name, batches = report.batches, "all batches upserted");
        Ok(report)
    }

    /// Load every supported file in `dir` and ingest the result.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, embedding, or storage fails.
    pub async fn load_and_ingest(
        &self,
        loader: &(dyn DocumentLoader + '_),
        dir: &Path,
    ) -> Result<IngestReport, DocumentError> {
        let documents = load_directory(dir, loader).await?;
        self.ingest_documents(&documents).await
    }
}
