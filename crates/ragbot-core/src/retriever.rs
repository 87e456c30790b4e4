use std::sync::Arc;

use ragbot_llm::EmbedFuture;
use ragbot_memory::document::TEXT_KEY;
use ragbot_memory::{QueryMatch, VectorIndex};

use crate::error::QaError;

pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

/// One stored chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
}

impl From<QueryMatch> for RetrievedChunk {
    fn from(m: QueryMatch) -> Self {
        let text = m.metadata_str(TEXT_KEY).unwrap_or_default().to_owned();
        Self {
            id: m.id,
            score: m.score,
            text,
        }
    }
}

/// Embeds a query and returns the `top_k` nearest chunks of one index.
pub struct Retriever {
    embed_fn: EmbedFn,
    index: Arc<dyn VectorIndex>,
    index_name: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embed_fn: EmbedFn,
        index: Arc<dyn VectorIndex>,
        index_name: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embed_fn,
            index,
            index_name: index_name.into(),
            top_k: top_k.max(1),
        }
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// # Errors
    ///
    /// Returns an error if embedding the query or the search fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, QaError> {
        let vector = (self.embed_fn)(query).await.map_err(QaError::Embedding)?;
        let matches = self
            .index
            .query(&self.index_name, vector, self.top_k)
            .await?;
        tracing::debug!(
            index = %self.index_name,
            matches = matches.len(),
            top_score = matches.first().map(|m| m.score),
            "retrieved chunks"
        );
        Ok(matches.into_iter().map(RetrievedChunk::from).collect())
    }
}
