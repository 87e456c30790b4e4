#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::path::{Path, PathBuf};

#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;

use super::{Document, DocumentError, DocumentLoader};

/// Load every file in `dir` (non-recursive) whose extension `loader` supports.
///
/// Files are visited in file-name order so chunk offsets are reproducible across runs.
///
/// # Errors
///
/// Returns [`DocumentError::Directory`] if `dir` cannot be read, or the first loader error.
pub async fn load_directory(
    dir: &Path,
    loader: &(dyn DocumentLoader + '_),
) -> Result<Vec<Document>, DocumentError> {
    let directory_error = |source| DocumentError::Directory {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(directory_error)?;

    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(directory_error)? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                loader
                    .supported_extensions()
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(ext))
            });
        if supported && entry.file_type().await.is_ok_and(|t| t.is_file()) {
            files.push(path);
        }
    }
    files.sort();

    let mut documents = Vec::new();
    for file in &files {
        let loaded = loader.load(file).await?;
        tracing::debug!(file = %file.display(), documents = loaded.len(), "loaded file");
        documents.extend(loaded);
    }
    tracing::info!(
        dir = %dir.display(),
        files = files.len(),
        documents = documents.len(),
        "loaded data directory"
    );
    Ok(documents)
}
