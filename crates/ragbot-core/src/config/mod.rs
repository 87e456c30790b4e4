mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to sensible defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// `DIMENSION` is set to something other than a positive integer.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Check required values and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.name.trim().is_empty() {
            bail!("index name is required: set INDEX_NAME or index.name");
        }
        if self.index.backend == IndexBackend::Pinecone
            && self.index.api_key.as_ref().is_none_or(crate::Secret::is_empty)
        {
            bail!("PINECONE_API_KEY is required for the pinecone index backend");
        }
        if self.index.dimension == 0 {
            bail!("index.dimension (DIMENSION) must be greater than 0");
        }
        if self.index.batch_size == 0 {
            bail!("index.batch_size must be greater than 0");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be greater than 0");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.llm.max_new_tokens == 0 {
            bail!("llm.max_new_tokens must be greater than 0");
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            bail!("llm.temperature must be a non-negative number");
        }
        if self.embedding.provider == ProviderKind::Candle && self.llm.provider != ProviderKind::Candle
        {
            bail!("embedding.provider = \"candle\" requires llm.provider = \"candle\"");
        }
        Ok(())
    }
}
