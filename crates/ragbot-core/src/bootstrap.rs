//! Application bootstrap: config resolution, provider/index/chain construction, ingestion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
#[cfg(feature = "candle")]
use anyhow::bail;
use ragbot_llm::{GenerationOptions, LlmProvider};
use ragbot_llm::any::AnyProvider;
use ragbot_llm::ollama::OllamaProvider;
use ragbot_memory::document::{
    DocumentLoader, IngestReport, IngestionPipeline, SplitterConfig, TextSplitter,
};
use ragbot_memory::{
    InMemoryIndex, IndexSpec, PineconeClient, PineconeConfig, QdrantIndex, VectorIndex,
};

use crate::chain::RetrievalQa;
use crate::config::{Config, IndexBackend, ProviderKind};
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Priority: `--config` argument > `RAGBOT_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("RAGBOT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Load, apply env overrides and validate.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or a required setting is missing.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn generation_options(config: &Config) -> GenerationOptions {
    GenerationOptions {
        max_new_tokens: config.llm.max_new_tokens,
        temperature: config.llm.temperature,
    }
}

/// Build the chat model client.
///
/// # Errors
///
/// Returns an error if the configured backend is unavailable in this build or fails to load.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(
            OllamaProvider::new(
                &config.llm.base_url,
                config.llm.model.clone(),
                config.embedding.model.clone(),
            )
            .with_generation(generation_options(config)),
        )),
        #[cfg(feature = "candle")]
        ProviderKind::Candle => create_candle_provider(config),
        #[cfg(not(feature = "candle"))]
        ProviderKind::Candle => {
            anyhow::bail!("llm.provider = \"candle\" requires building with the candle feature")
        }
    }
}

#[cfg(feature = "candle")]
fn create_candle_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    use ragbot_llm::candle_provider::CandleProvider;
    use ragbot_llm::candle_provider::generate::GenerationConfig;
    use ragbot_llm::candle_provider::loader::ModelSource;
    use ragbot_llm::candle_provider::template::ChatTemplate;

    let candle_cfg = config.llm.candle.clone().unwrap_or_default();

    let source = match candle_cfg.source.as_str() {
        "local" => ModelSource::Local {
            path: PathBuf::from(&candle_cfg.local_path),
            tokenizer: candle_cfg.tokenizer_path.as_ref().map(PathBuf::from),
        },
        "huggingface" => ModelSource::HuggingFace {
            repo_id: candle_cfg
                .repo_id
                .clone()
                .unwrap_or_else(|| config.llm.model.clone()),
            filename: candle_cfg.filename.clone(),
            tokenizer_repo: candle_cfg.tokenizer_repo.clone(),
        },
        other => bail!("unknown llm.candle.source {other:?}, expected \"local\" or \"huggingface\""),
    };

    let template = ChatTemplate::parse_str(&candle_cfg.chat_template);
    let generation = GenerationConfig {
        seed: candle_cfg.seed,
        repeat_penalty: candle_cfg.repeat_penalty,
        repeat_last_n: candle_cfg.repeat_last_n,
        ..GenerationConfig::from(generation_options(config))
    };
    let embedding_repo = (config.embedding.provider == ProviderKind::Candle)
        .then_some(config.embedding.candle_repo.as_str());

    let device = select_device(&candle_cfg.device)?;
    let provider = CandleProvider::new(&source, template, generation, embedding_repo, device)
        .context("failed to load candle model")?;
    if let Some(dimension) = provider.embedding_dimension()
        && dimension != config.index.dimension
    {
        bail!(
            "embedding model {} produces {dimension}-dimensional vectors but index.dimension is {}",
            config.embedding.candle_repo,
            config.index.dimension
        );
    }
    Ok(AnyProvider::Candle(provider))
}

/// # Errors
///
/// Returns an error if the requested accelerator is not compiled in.
#[cfg(feature = "candle")]
pub fn select_device(preference: &str) -> anyhow::Result<ragbot_llm::candle_provider::Device> {
    use ragbot_llm::candle_provider::Device;

    match preference {
        "metal" => {
            #[cfg(feature = "metal")]
            return Ok(Device::new_metal(0)?);
            #[cfg(not(feature = "metal"))]
            bail!("candle compiled without metal feature");
        }
        "cuda" => {
            #[cfg(feature = "cuda")]
            return Ok(Device::new_cuda(0)?);
            #[cfg(not(feature = "cuda"))]
            bail!("candle compiled without cuda feature");
        }
        "auto" => {
            #[cfg(feature = "metal")]
            if let Ok(device) = Device::new_metal(0) {
                return Ok(device);
            }
            #[cfg(feature = "cuda")]
            if let Ok(device) = Device::new_cuda(0) {
                return Ok(device);
            }
            Ok(Device::Cpu)
        }
        _ => Ok(Device::Cpu),
    }
}

/// Build the embedding client. A candle embedder shares the chat provider when one is given.
///
/// # Errors
///
/// Returns an error if the backend cannot be built.
pub fn create_embedder(config: &Config, chat: Option<&AnyProvider>) -> anyhow::Result<AnyProvider> {
    match config.embedding.provider {
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.embedding.base_url,
            config.llm.model.clone(),
            config.embedding.model.clone(),
        ))),
        ProviderKind::Candle => match chat {
            Some(provider) => Ok(provider.clone()),
            None => create_provider(config),
        },
    }
}

/// # Errors
///
/// Returns an error if the backend client cannot be created.
pub fn create_index(config: &Config) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.index.backend {
        IndexBackend::Pinecone => {
            let api_key = config
                .index
                .api_key
                .as_ref()
                .context("PINECONE_API_KEY is required for the pinecone index backend")?;
            let pinecone_cfg = PineconeConfig {
                control_url: config.index.control_url.clone(),
                ..PineconeConfig::default()
            };
            Arc::new(
                PineconeClient::new(
                    ragbot_llm::http::default_client(),
                    api_key.expose(),
                    pinecone_cfg,
                )
                .context("failed to create Pinecone client")?,
            )
        }
        IndexBackend::Qdrant => Arc::new(
            QdrantIndex::new(&config.index.qdrant_url).context("failed to create Qdrant client")?,
        ),
        IndexBackend::Memory => {
            tracing::warn!("using the in-memory index: contents are lost when the process exits");
            Arc::new(InMemoryIndex::new())
        }
    };
    tracing::info!(backend = %config.index.backend, index = %config.index.name, "vector index configured");
    Ok(index)
}

#[must_use]
pub fn index_spec(config: &Config) -> IndexSpec {
    IndexSpec {
        name: config.index.name.clone(),
        dimension: config.index.dimension,
        metric: config.index.metric,
        cloud: config.index.cloud.clone(),
        region: config.index.region.clone(),
    }
}

/// # Errors
///
/// Returns an error if the configured template file cannot be read or is invalid.
pub async fn load_prompt(config: &Config) -> anyhow::Result<PromptTemplate> {
    match &config.prompt.path {
        Some(path) => PromptTemplate::load(path)
            .await
            .with_context(|| format!("failed to load prompt template {}", path.display())),
        None => Ok(PromptTemplate::default()),
    }
}

#[must_use]
pub fn ingestion_pipeline(
    config: &Config,
    embedder: &AnyProvider,
    index: Arc<dyn VectorIndex>,
) -> IngestionPipeline {
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: config.ingest.chunk_size,
        chunk_overlap: config.ingest.chunk_overlap,
        ..SplitterConfig::default()
    });
    IngestionPipeline::new(
        splitter,
        index,
        index_spec(config),
        Box::new(embedder.embed_batch_fn()),
    )
    .with_batch_size(config.index.batch_size)
}

/// Load every PDF in `data_dir` and upsert it into the configured index.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or any pipeline stage fails.
pub async fn run_ingest(config: &Config, data_dir: &Path) -> anyhow::Result<IngestReport> {
    let embedder = create_embedder(config, None)?;
    let index = create_index(config)?;
    let pipeline = ingestion_pipeline(config, &embedder, index);
    ingest_with(&pipeline, &pdf_loader()?, data_dir).await
}

/// # Errors
///
/// Returns an error if loading or any pipeline stage fails.
pub async fn ingest_with(
    pipeline: &IngestionPipeline,
    loader: &(dyn DocumentLoader + '_),
    data_dir: &Path,
) -> anyhow::Result<IngestReport> {
    tracing::info!(dir = %data_dir.display(), index = pipeline.index_name(), "starting ingestion");
    pipeline
        .load_and_ingest(loader, data_dir)
        .await
        .with_context(|| format!("ingestion of {} failed", data_dir.display()))
}

#[cfg(feature = "pdf")]
fn pdf_loader() -> anyhow::Result<ragbot_memory::document::PdfLoader> {
    Ok(ragbot_memory::document::PdfLoader::default())
}

#[cfg(not(feature = "pdf"))]
fn pdf_loader() -> anyhow::Result<ragbot_memory::document::TextLoader> {
    anyhow::bail!("PDF ingestion requires building with the pdf feature")
}

pub async fn health_check(provider: &AnyProvider) {
    match provider {
        AnyProvider::Ollama(ollama) => match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        },
        #[cfg(feature = "candle")]
        AnyProvider::Candle(candle) => {
            tracing::info!("candle provider loaded, device: {}", candle.device_name());
        }
        #[allow(unreachable_patterns)]
        _ => {}
    }
}

pub async fn warmup_provider(provider: &AnyProvider) {
    if let AnyProvider::Ollama(ollama) = provider {
        let start = std::time::Instant::now();
        match ollama.warmup().await {
            Ok(()) => {
                tracing::info!("ollama model ready ({:.1}s)", start.elapsed().as_secs_f64());
            }
            Err(e) => tracing::warn!("ollama warmup failed: {e:#}"),
        }
    }
}

/// Everything the query service needs, built once at startup and shared read-only.
pub struct AppContext {
    config: Config,
    index: Arc<dyn VectorIndex>,
    qa: Arc<RetrievalQa<AnyProvider>>,
}

impl AppContext {
    /// Build providers and the index client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if any collaborator cannot be created.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let llm = create_provider(&config)?;
        let embedder = create_embedder(&config, Some(&llm))?;
        let index = create_index(&config)?;
        Self::with_components(config, llm, embedder, index).await
    }

    /// Assemble the retriever and chain around already built collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt template cannot be loaded.
    pub async fn with_components(
        config: Config,
        llm: AnyProvider,
        embedder: AnyProvider,
        index: Arc<dyn VectorIndex>,
    ) -> anyhow::Result<Self> {
        let prompt = load_prompt(&config).await?;
        let retriever = Retriever::new(
            Box::new(embedder.embed_fn()),
            Arc::clone(&index),
            config.index.name.clone(),
            config.retrieval.top_k,
        );
        tracing::info!(
            llm = llm.name(),
            top_k = retriever.top_k(),
            max_new_tokens = config.llm.max_new_tokens,
            temperature = config.llm.temperature,
            "retrieval QA chain ready"
        );
        let qa = Arc::new(RetrievalQa::new(retriever, llm, prompt));
        Ok(Self { config, index, qa })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn qa(&self) -> Arc<RetrievalQa<AnyProvider>> {
        Arc::clone(&self.qa)
    }

    /// Warn early when the index has not been populated yet; queries would fail.
    pub async fn check_index(&self) {
        match self.index.index_exists(&self.config.index.name).await {
            Ok(true) => tracing::info!(index = %self.config.index.name, "connected to index"),
            Ok(false) => tracing::warn!(
                index = %self.config.index.name,
                "index does not exist yet, run `ragbot ingest` first"
            ),
            Err(e) => tracing::warn!("failed to check index: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use ragbot_llm::mock::MockProvider;
    use ragbot_memory::Metric;
    use serial_test::serial;

    use super::*;
    use crate::secret::Secret;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.index.name = "medical-bot".into();
        config.index.dimension = 8;
        config.index.backend = IndexBackend::Memory;
        config
    }

    #[test]
    #[serial]
    fn resolve_config_path_priority() {
        unsafe { std::env::remove_var("RAGBOT_CONFIG") };
        assert_eq!(resolve_config_path(None), PathBuf::from("config/default.toml"));

        unsafe { std::env::set_var("RAGBOT_CONFIG", "/etc/ragbot.toml") };
        assert_eq!(resolve_config_path(None), PathBuf::from("/etc/ragbot.toml"));
        assert_eq!(
            resolve_config_path(Some(Path::new("cli.toml"))),
            PathBuf::from("cli.toml")
        );
        unsafe { std::env::remove_var("RAGBOT_CONFIG") };
    }

    #[test]
    #[serial]
    fn load_config_rejects_missing_api_key() {
        for key in ["PINECONE_API_KEY", "INDEX_NAME", "RAGBOT_INDEX_BACKEND"] {
            unsafe { std::env::remove_var(key) };
        }
        unsafe { std::env::set_var("INDEX_NAME", "medical-bot") };
        let err = load_config(Path::new("/nonexistent")).unwrap_err();
        unsafe { std::env::remove_var("INDEX_NAME") };
        assert!(format!("{err:#}").contains("PINECONE_API_KEY"));
    }

    #[test]
    fn create_provider_ollama() {
        let config = test_config();
        let provider = create_provider(&config).unwrap();
        assert!(matches!(provider, AnyProvider::Ollama(_)));
        assert_eq!(provider.name(), "ollama");
    }

    #[cfg(not(feature = "candle"))]
    #[test]
    fn create_provider_candle_without_feature_errors() {
        let mut config = test_config();
        config.llm.provider = ProviderKind::Candle;
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("candle feature"));
    }

    #[test]
    fn create_embedder_uses_embedding_model() {
        let mut config = test_config();
        config.embedding.model = "nomic-embed-text".into();
        let embedder = create_embedder(&config, None).unwrap();
        match embedder {
            AnyProvider::Ollama(ollama) => assert_eq!(ollama.embedding_model(), "nomic-embed-text"),
            other => panic!("unexpected provider: {other:?}"),
        }
    }

    #[test]
    fn create_embedder_candle_reuses_chat_provider() {
        let mut config = test_config();
        config.embedding.provider = ProviderKind::Candle;
        let chat = AnyProvider::Mock(MockProvider::default());
        let embedder = create_embedder(&config, Some(&chat)).unwrap();
        assert_eq!(embedder.name(), "mock");
    }

    #[tokio::test]
    async fn create_index_for_each_backend() {
        let mut config = test_config();
        assert!(create_index(&config).is_ok());

        config.index.backend = IndexBackend::Qdrant;
        assert!(create_index(&config).is_ok());

        config.index.backend = IndexBackend::Pinecone;
        assert!(create_index(&config).is_err());
        config.index.api_key = Some(Secret::new("pc-key"));
        assert!(create_index(&config).is_ok());
    }

    #[test]
    fn index_spec_from_config() {
        let mut config = test_config();
        config.index.region = "eu-west-1".into();
        let spec = index_spec(&config);
        assert_eq!(spec.name, "medical-bot");
        assert_eq!(spec.dimension, 8);
        assert_eq!(spec.metric, Metric::Cosine);
        assert_eq!(spec.cloud, "aws");
        assert_eq!(spec.region, "eu-west-1");
    }

    #[tokio::test]
    async fn load_prompt_default_and_file() {
        let mut config = test_config();
        assert_eq!(load_prompt(&config).await.unwrap(), PromptTemplate::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.txt");
        std::fs::write(&path, "no slots here").unwrap();
        config.prompt.path = Some(path);
        assert!(load_prompt(&config).await.is_err());
    }

    #[tokio::test]
    async fn ingest_then_answer_with_components() {
        let config = test_config();
        let provider = AnyProvider::Mock(
            MockProvider::with_responses(vec!["Acne is a skin condition.".into()]).with_dimension(8),
        );
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryIndex::new());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acne.txt"), "Acne is a common skin condition.").unwrap();
        let pipeline = ingestion_pipeline(&config, &provider, Arc::clone(&index));
        let report = ingest_with(
            &pipeline,
            &ragbot_memory::document::TextLoader::default(),
            dir.path(),
        )
        .await
        .unwrap();
        assert!(report.created_index);
        assert_eq!(report.chunks, 1);

        let ctx = AppContext::with_components(config, provider.clone(), provider, index)
            .await
            .unwrap();
        ctx.check_index().await;
        let answer = ctx.qa().invoke("What is acne?").await.unwrap();
        assert_eq!(answer.result, "Acne is a skin condition.");
        assert_eq!(answer.source_documents[0].id, "id-0");
    }

    #[tokio::test]
    async fn ingest_missing_directory_fails() {
        let config = test_config();
        let provider = AnyProvider::Mock(MockProvider::default().with_dimension(8));
        let pipeline = ingestion_pipeline(&config, &provider, Arc::new(InMemoryIndex::new()));
        let err = ingest_with(
            &pipeline,
            &ragbot_memory::document::TextLoader::default(),
            Path::new("/nonexistent/data"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("ingestion of /nonexistent/data failed"));
    }
}
