use std::io::Write;
use std::path::{Path, PathBuf};

use ragbot_memory::Metric;
use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 30] = [
    "PINECONE_API_KEY",
    "INDEX_NAME",
    "PINECONE_ENV",
    "DIMENSION",
    "RAGBOT_INDEX_BACKEND",
    "RAGBOT_INDEX_METRIC",
    "RAGBOT_INDEX_CLOUD",
    "RAGBOT_PINECONE_CONTROL_URL",
    "RAGBOT_QDRANT_URL",
    "RAGBOT_INDEX_BATCH_SIZE",
    "RAGBOT_LLM_PROVIDER",
    "RAGBOT_LLM_BASE_URL",
    "RAGBOT_LLM_MODEL",
    "RAGBOT_LLM_MAX_NEW_TOKENS",
    "RAGBOT_LLM_TEMPERATURE",
    "RAGBOT_CANDLE_MODEL_PATH",
    "RAGBOT_CANDLE_DEVICE",
    "RAGBOT_EMBEDDING_PROVIDER",
    "RAGBOT_EMBEDDING_BASE_URL",
    "RAGBOT_EMBEDDING_MODEL",
    "RAGBOT_EMBEDDING_CANDLE_REPO",
    "RAGBOT_RETRIEVAL_TOP_K",
    "RAGBOT_DATA_DIR",
    "RAGBOT_CHUNK_SIZE",
    "RAGBOT_CHUNK_OVERLAP",
    "RAGBOT_PROMPT_PATH",
    "RAGBOT_SERVER_HOST",
    "RAGBOT_SERVER_PORT",
    "RAGBOT_SERVER_MAX_BODY_SIZE",
    "RAGBOT_CONFIG",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn set_env(key: &str, value: &str) {
    unsafe { std::env::set_var(key, value) };
}

fn valid_config() -> Config {
    let mut config = Config::default();
    config.index.name = "medical-bot".into();
    config.index.api_key = Some(crate::Secret::new("pc-key"));
    config
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.llm.max_new_tokens, 512);
    assert!((config.llm.temperature - 0.8).abs() < f64::EPSILON);
    assert!(config.llm.candle.is_none());
    assert_eq!(config.embedding.model, "all-minilm");
    assert_eq!(config.index.backend, IndexBackend::Pinecone);
    assert_eq!(config.index.dimension, 384);
    assert_eq!(config.index.metric, Metric::Cosine);
    assert_eq!(config.index.cloud, "aws");
    assert_eq!(config.index.batch_size, 100);
    assert_eq!(config.index.control_url, "https://api.pinecone.io");
    assert_eq!(config.retrieval.top_k, 1);
    assert_eq!(config.ingest.data_dir, PathBuf::from("data"));
    assert_eq!(config.ingest.chunk_size, 500);
    assert_eq!(config.ingest.chunk_overlap, 20);
    assert!(config.prompt.path.is_none());
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/ragbot.toml")).unwrap();
    assert_eq!(config.index.name, "");
    assert_eq!(config.server.port, 8080);
}

#[test]
#[serial]
fn parse_toml_sections() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "candle"
max_new_tokens = 256

[llm.candle]
local_path = "/models/llama.gguf"
chat_template = "raw"

[embedding]
provider = "candle"

[index]
backend = "qdrant"
name = "docs"
dimension = 768
metric = "dotproduct"

[retrieval]
top_k = 3

[ingest]
data_dir = "pdfs"
chunk_size = 800
chunk_overlap = 50

[prompt]
path = "prompts/qa.txt"

[server]
host = "127.0.0.1"
port = 9000
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Candle);
    assert_eq!(config.llm.max_new_tokens, 256);
    let candle = config.llm.candle.as_ref().unwrap();
    assert_eq!(candle.local_path, "/models/llama.gguf");
    assert_eq!(candle.chat_template, "raw");
    assert_eq!(candle.device, "cpu");
    assert_eq!(config.embedding.provider, ProviderKind::Candle);
    assert_eq!(config.index.backend, IndexBackend::Qdrant);
    assert_eq!(config.index.name, "docs");
    assert_eq!(config.index.dimension, 768);
    assert_eq!(config.index.metric, Metric::Dotproduct);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.ingest.data_dir, PathBuf::from("pdfs"));
    assert_eq!(config.ingest.chunk_overlap, 50);
    assert_eq!(config.prompt.path, Some(PathBuf::from("prompts/qa.txt")));
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9000);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[index\nname = ").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn plain_env_vars_override_index() {
    clear_env();
    set_env("PINECONE_API_KEY", "pc-secret");
    set_env("INDEX_NAME", "medical-bot");
    set_env("PINECONE_ENV", "eu-west-1");
    set_env("DIMENSION", "768");

    let config = Config::load(Path::new("/nonexistent")).unwrap();
    clear_env();

    assert_eq!(config.index.api_key.as_ref().unwrap().expose(), "pc-secret");
    assert_eq!(config.index.name, "medical-bot");
    assert_eq!(config.index.region, "eu-west-1");
    assert_eq!(config.index.dimension, 768);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn invalid_dimension_is_an_error() {
    clear_env();
    set_env("DIMENSION", "lots");
    let err = Config::load(Path::new("/nonexistent")).unwrap_err();
    set_env("DIMENSION", "0");
    let zero = Config::load(Path::new("/nonexistent")).unwrap_err();
    clear_env();
    assert!(err.to_string().contains("DIMENSION"));
    assert!(err.to_string().contains("lots"));
    assert!(zero.to_string().contains("DIMENSION"));
}

#[test]
#[serial]
fn ragbot_env_vars_override_everything_else() {
    clear_env();
    set_env("RAGBOT_INDEX_BACKEND", "Memory");
    set_env("RAGBOT_INDEX_BATCH_SIZE", "25");
    set_env("RAGBOT_LLM_PROVIDER", "candle");
    set_env("RAGBOT_LLM_TEMPERATURE", "0.2");
    set_env("RAGBOT_CANDLE_DEVICE", "metal");
    set_env("RAGBOT_EMBEDDING_MODEL", "nomic-embed-text");
    set_env("RAGBOT_RETRIEVAL_TOP_K", "4");
    set_env("RAGBOT_CHUNK_SIZE", "1000");
    set_env("RAGBOT_PROMPT_PATH", "/etc/ragbot/prompt.txt");
    set_env("RAGBOT_SERVER_PORT", "3000");

    let config = Config::load(Path::new("/nonexistent")).unwrap();
    clear_env();

    assert_eq!(config.index.backend, IndexBackend::Memory);
    assert_eq!(config.index.batch_size, 25);
    assert_eq!(config.llm.provider, ProviderKind::Candle);
    assert!((config.llm.temperature - 0.2).abs() < f64::EPSILON);
    assert_eq!(config.llm.candle.as_ref().unwrap().device, "metal");
    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.ingest.chunk_size, 1000);
    assert_eq!(
        config.prompt.path,
        Some(PathBuf::from("/etc/ragbot/prompt.txt"))
    );
    assert_eq!(config.server.port, 3000);
}

#[test]
#[serial]
fn invalid_provider_env_is_ignored() {
    clear_env();
    set_env("RAGBOT_LLM_PROVIDER", "gpt");
    let config = Config::load(Path::new("/nonexistent")).unwrap();
    clear_env();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
}

#[test]
fn validate_accepts_complete_config() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn validate_requires_index_name() {
    let mut config = valid_config();
    config.index.name = "  ".into();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("INDEX_NAME"));
}

#[test]
fn validate_requires_pinecone_api_key() {
    let mut config = valid_config();
    config.index.api_key = None;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("PINECONE_API_KEY"));

    config.index.api_key = Some(crate::Secret::new(""));
    assert!(config.validate().is_err());
}

#[test]
fn api_key_not_required_for_other_backends() {
    let mut config = valid_config();
    config.index.api_key = None;
    config.index.backend = IndexBackend::Qdrant;
    assert!(config.validate().is_ok());
    config.index.backend = IndexBackend::Memory;
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = valid_config();
    config.index.dimension = 0;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.index.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = valid_config();
    config.llm.max_new_tokens = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_overlap_not_smaller_than_size() {
    let mut config = valid_config();
    config.ingest.chunk_size = 20;
    config.ingest.chunk_overlap = 20;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("chunk_overlap"));
}

#[test]
fn validate_rejects_negative_temperature() {
    let mut config = valid_config();
    config.llm.temperature = -0.1;
    assert!(config.validate().is_err());
    config.llm.temperature = f64::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn candle_embeddings_require_candle_llm() {
    let mut config = valid_config();
    config.embedding.provider = ProviderKind::Candle;
    assert!(config.validate().is_err());
    config.llm.provider = ProviderKind::Candle;
    assert!(config.validate().is_ok());
}

#[test]
fn secret_not_in_debug_output() {
    let config = valid_config();
    let debug = format!("{config:?}");
    assert!(!debug.contains("pc-key"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn provider_kind_display() {
    assert_eq!(ProviderKind::Ollama.to_string(), "ollama");
    assert_eq!(ProviderKind::Candle.to_string(), "candle");
    assert_eq!(IndexBackend::Pinecone.to_string(), "pinecone");
    assert_eq!(IndexBackend::Memory.as_str(), "memory");
}
