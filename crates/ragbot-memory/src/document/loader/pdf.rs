use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;

use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata};

/// Extracts PDF text page by page; each page becomes one document tagged with its page number.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

fn page_documents(source: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .map(|(page, content)| Document {
            content,
            metadata: DocumentMetadata {
                source: source.to_owned(),
                content_type: "application/pdf".to_owned(),
                extra: HashMap::from([("page".to_owned(), page.to_string())]),
            },
        })
        .collect()
}

impl DocumentLoader for PdfLoader {
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

            let source = path.display().to_string();
            let extract_path = path.clone();
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_by_pages(&extract_path)
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))?
            .map_err(|e| DocumentError::Pdf {
                path: source.clone(),
                message: e.to_string(),
            })?;

            Ok(page_documents(&source, pages))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
