use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read data directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[cfg(feature = "pdf")]
    #[error("PDF error in {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("embedding failed: {0}")]
    Embedding(#[from] ragbot_llm::LlmError),

    #[error("embedding count mismatch: {chunks} chunks, {vectors} vectors")]
    EmbeddingCount { chunks: usize, vectors: usize },

    #[error(
        "index {index} has dimension {existing} but embeddings are configured for {configured}"
    )]
    IndexDimension {
        index: String,
        existing: usize,
        configured: usize,
    },

    #[error("vector index error: {0}")]
    Index(#[from] crate::vector_index::VectorIndexError),
}
