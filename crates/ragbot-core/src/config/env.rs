use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;
use serde::de::DeserializeOwned;

use super::Config;
use crate::secret::Secret;

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

/// Lowercase enum value parsed through its serde representation.
fn kind<T: DeserializeOwned>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.trim().to_lowercase())) {
        Some(kind)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_env_overrides_index()?;
        self.apply_env_overrides_models();
        self.apply_env_overrides_service();
        Ok(())
    }

    /// Plain variables shared with other tooling come first; `RAGBOT_*` take precedence.
    fn apply_env_overrides_index(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = std::env::var("PINECONE_API_KEY") {
            self.index.api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("INDEX_NAME") {
            self.index.name = v;
        }
        if let Ok(v) = std::env::var("PINECONE_ENV") {
            self.index.region = v;
        }
        // The embedding width must match the index, so a bad value stops startup.
        if let Ok(v) = std::env::var("DIMENSION") {
            match v.trim().parse::<usize>() {
                Ok(dimension) if dimension > 0 => self.index.dimension = dimension,
                _ => bail!("DIMENSION must be a positive integer, got {v:?}"),
            }
        }
        if let Some(backend) = kind("RAGBOT_INDEX_BACKEND") {
            self.index.backend = backend;
        }
        if let Some(metric) = kind("RAGBOT_INDEX_METRIC") {
            self.index.metric = metric;
        }
        if let Ok(v) = std::env::var("RAGBOT_INDEX_CLOUD") {
            self.index.cloud = v;
        }
        if let Ok(v) = std::env::var("RAGBOT_PINECONE_CONTROL_URL") {
            self.index.control_url = v;
        }
        if let Ok(v) = std::env::var("RAGBOT_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Some(size) = parsed("RAGBOT_INDEX_BATCH_SIZE") {
            self.index.batch_size = size;
        }
        Ok(())
    }

    fn apply_env_overrides_models(&mut self) {
        if let Some(provider) = kind("RAGBOT_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(v) = std::env::var("RAGBOT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("RAGBOT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(tokens) = parsed("RAGBOT_LLM_MAX_NEW_TOKENS") {
            self.llm.max_new_tokens = tokens;
        }
        if let Some(temperature) = parsed("RAGBOT_LLM_TEMPERATURE") {
            self.llm.temperature = temperature;
        }
        if let Ok(v) = std::env::var("RAGBOT_CANDLE_MODEL_PATH") {
            self.llm.candle.get_or_insert_with(Default::default).local_path = v;
        }
        if let Ok(v) = std::env::var("RAGBOT_CANDLE_DEVICE") {
            self.llm.candle.get_or_insert_with(Default::default).device = v;
        }
        if let Some(provider) = kind("RAGBOT_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(v) = std::env::var("RAGBOT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("RAGBOT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("RAGBOT_EMBEDDING_CANDLE_REPO") {
            self.embedding.candle_repo = v;
        }
    }

    fn apply_env_overrides_service(&mut self) {
        if let Some(top_k) = parsed("RAGBOT_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = top_k;
        }
        if let Ok(v) = std::env::var("RAGBOT_DATA_DIR") {
            self.ingest.data_dir = PathBuf::from(v);
        }
        if let Some(size) = parsed("RAGBOT_CHUNK_SIZE") {
            self.ingest.chunk_size = size;
        }
        if let Some(overlap) = parsed("RAGBOT_CHUNK_OVERLAP") {
            self.ingest.chunk_overlap = overlap;
        }
        if let Ok(v) = std::env::var("RAGBOT_PROMPT_PATH") {
            self.prompt.path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("RAGBOT_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(port) = parsed("RAGBOT_SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(size) = parsed("RAGBOT_SERVER_MAX_BODY_SIZE") {
            self.server.max_body_size = size;
        }
    }
}
