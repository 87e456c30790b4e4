use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;

use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata};

/// Loads plain text and markdown files as a single document each.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = tokio::fs::canonicalize(&path).await?;
            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("md" | "markdown") => "text/markdown",
                _ => "text/plain",
            };
            let content = tokio::fs::read_to_string(&path).await?;

            Ok(vec![Document {
                content,
                metadata: DocumentMetadata {
                    source: path.display().to_string(),
                    content_type: content_type.to_owned(),
                    extra: HashMap::new(),
                },
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}
