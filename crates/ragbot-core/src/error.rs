use ragbot_llm::LlmError;
use ragbot_memory::VectorIndexError;

/// Failure while answering one question.
#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("failed to embed query: {0}")]
    Embedding(#[source] LlmError),
    #[error("similarity search failed: {0}")]
    Search(#[from] VectorIndexError),
    #[error("LLM generation failed: {0}")]
    Generation(#[source] LlmError),
}
