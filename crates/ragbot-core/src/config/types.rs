use std::path::PathBuf;

use ragbot_memory::Metric;
use serde::Deserialize;

use crate::secret::Secret;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Model backend selector, shared by the chat and embedding sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Candle,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Candle => "candle",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub candle: Option<CandleConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_ollama_url(),
            model: default_llm_model(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            candle: None,
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}

fn default_llm_model() -> String {
    "llama2:7b-chat".into()
}

fn default_max_new_tokens() -> usize {
    512
}

fn default_temperature() -> f64 {
    0.8
}

/// Local GGUF chat model settings for the `candle` provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleConfig {
    /// `local` reads `local_path`; `huggingface` downloads `filename` from `repo_id`.
    #[serde(default = "default_candle_source")]
    pub source: String,
    #[serde(default = "default_candle_local_path")]
    pub local_path: String,
    #[serde(default)]
    pub tokenizer_path: Option<String>,
    #[serde(default)]
    pub repo_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub tokenizer_repo: Option<String>,
    /// Model family prompt format: `llama2` or `raw`.
    #[serde(default = "default_chat_template")]
    pub chat_template: String,
    #[serde(default = "default_candle_device")]
    pub device: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default = "default_repeat_last_n")]
    pub repeat_last_n: usize,
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            source: default_candle_source(),
            local_path: default_candle_local_path(),
            tokenizer_path: None,
            repo_id: None,
            filename: None,
            tokenizer_repo: None,
            chat_template: default_chat_template(),
            device: default_candle_device(),
            seed: default_seed(),
            repeat_penalty: default_repeat_penalty(),
            repeat_last_n: default_repeat_last_n(),
        }
    }
}

fn default_candle_source() -> String {
    "local".into()
}

fn default_candle_local_path() -> String {
    "model/llama-2-7b-chat.Q4_0.gguf".into()
}

fn default_chat_template() -> String {
    "llama2".into()
}

fn default_candle_device() -> String {
    "cpu".into()
}

fn default_seed() -> u64 {
    42
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_repeat_last_n() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Ollama embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// BERT sentence encoder loaded by the `candle` provider.
    #[serde(default = "default_candle_embedding_repo")]
    pub candle_repo: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            candle_repo: default_candle_embedding_repo(),
        }
    }
}

fn default_embedding_model() -> String {
    "all-minilm".into()
}

fn default_candle_embedding_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}

/// Vector index backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Pinecone,
    Qdrant,
    /// Process-local; contents vanish on exit.
    Memory,
}

impl IndexBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pinecone => "pinecone",
            Self::Qdrant => "qdrant",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub api_key: Option<Secret>,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            name: String::new(),
            dimension: default_dimension(),
            metric: Metric::default(),
            cloud: default_cloud(),
            region: default_region(),
            api_key: None,
            control_url: default_control_url(),
            qdrant_url: default_qdrant_url(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_dimension() -> usize {
    384
}

fn default_cloud() -> String {
    "aws".into()
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_control_url() -> String {
    ragbot_memory::pinecone::DEFAULT_CONTROL_URL.into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_batch_size() -> usize {
    ragbot_memory::document::DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    20
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptConfig {
    /// Template file with `{context}` and `{question}`; the built-in prompt when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_size() -> usize {
    65_536
}
