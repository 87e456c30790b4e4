use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
    pub extra: HashMap<String, String>,
}

impl DocumentMetadata {
    /// Zero-based page number for paged formats.
    #[must_use]
    pub fn page(&self) -> Option<usize> {
        self.extra.get("page").and_then(|p| p.parse().ok())
    }
}

/// Extracted text of one file, or of one page for paged formats.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
    pub created_index: bool,
}
