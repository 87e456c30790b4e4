//! Document ingestion and vector index backends (Pinecone, Qdrant, in-memory).

pub mod document;
pub mod in_memory_index;
pub mod pinecone;
pub mod qdrant_index;
pub mod vector_index;

pub use in_memory_index::InMemoryIndex;
pub use pinecone::{PineconeClient, PineconeConfig};
pub use qdrant_index::QdrantIndex;
pub use vector_index::{
    IndexDescription, IndexSpec, Metric, QueryMatch, VectorIndex, VectorIndexError, VectorRecord,
};
