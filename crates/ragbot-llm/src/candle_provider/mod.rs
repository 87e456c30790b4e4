//! Local inference: a quantized GGUF llama chat model plus an optional BERT embedding model.

pub mod embed;
pub mod generate;
pub mod loader;
pub mod template;

use std::sync::{Arc, Mutex};

pub use candle_core::Device;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

use self::embed::EmbedModel;
use self::generate::{GenerationConfig, GenerationOutput, generate_tokens};
use self::loader::{LoadedModel, ModelSource, load_chat_model};
use self::template::ChatTemplate;

#[derive(Clone)]
pub struct CandleProvider {
    // The KV cache lives inside the weights, so generations are serialized.
    weights: Arc<Mutex<ModelWeights>>,
    tokenizer: Arc<Tokenizer>,
    eos_token_id: u32,
    template: ChatTemplate,
    generation_config: GenerationConfig,
    embed_model: Option<Arc<EmbedModel>>,
    device: Device,
}

impl std::fmt::Debug for CandleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleProvider")
            .field("template", &self.template)
            .field("generation_config", &self.generation_config)
            .field("device", &format!("{:?}", self.device))
            .field("embed_model", &self.embed_model)
            .finish_non_exhaustive()
    }
}

impl CandleProvider {
    /// Load the chat model from `source` and, when `embedding_repo` is set, a BERT encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if either model fails to load.
    pub fn new(
        source: &ModelSource,
        template: ChatTemplate,
        generation_config: GenerationConfig,
        embedding_repo: Option<&str>,
        device: Device,
    ) -> Result<Self, LlmError> {
        let LoadedModel {
            weights,
            tokenizer,
            eos_token_id,
        } = load_chat_model(source, &device)?;

        let embed_model = embedding_repo
            .map(|repo| EmbedModel::load(repo, &device).map(Arc::new))
            .transpose()?;

        Ok(Self {
            weights: Arc::new(Mutex::new(weights)),
            tokenizer: Arc::new(tokenizer),
            eos_token_id,
            template,
            generation_config,
            embed_model,
            device,
        })
    }

    #[must_use]
    pub fn device_name(&self) -> &'static str {
        match &self.device {
            Device::Cpu => "cpu",
            Device::Cuda(_) => "cuda",
            Device::Metal(_) => "metal",
        }
    }

    /// Embedding width of the loaded encoder, if any.
    #[must_use]
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.embed_model.as_ref().map(|m| m.dimension())
    }

    fn generate_sync(&self, messages: &[Message]) -> Result<String, LlmError> {
        let prompt = self.template.format(messages);
        let encoding = self
            .tokenizer
            .encode(prompt.as_str(), false)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let mut weights = self
            .weights
            .lock()
            .map_err(|e| LlmError::Inference(format!("model lock poisoned: {e}")))?;
        let mut forward_fn =
            |input: &candle_core::Tensor, pos: usize| -> Result<candle_core::Tensor, LlmError> {
                weights.forward(input, pos).map_err(LlmError::Candle)
            };

        let GenerationOutput {
            text,
            tokens_generated,
        } = generate_tokens(
            &mut forward_fn,
            &self.tokenizer,
            encoding.get_ids(),
            &self.generation_config,
            self.eos_token_id,
            &self.device,
        )?;

        tracing::debug!(
            prompt_tokens = encoding.len(),
            tokens_generated,
            "candle generation finished"
        );
        Ok(text)
    }
}

impl LlmProvider for CandleProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let provider = self.clone();
        let messages = messages.to_vec();
        tokio::task::spawn_blocking(move || provider.generate_sync(&messages))
            .await
            .map_err(|e| LlmError::Inference(format!("candle generation task failed: {e}")))?
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let Some(embed_model) = self.embed_model.clone() else {
            return Err(LlmError::EmbedUnsupported {
                provider: "candle".into(),
            });
        };
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || embed_model.embed_sync(&text))
            .await
            .map_err(|e| LlmError::Inference(format!("candle embedding task failed: {e}")))?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let Some(embed_model) = self.embed_model.clone() else {
            return Err(LlmError::EmbedUnsupported {
                provider: "candle".into(),
            });
        };
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|t| embed_model.embed_sync(t))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| LlmError::Inference(format!("candle embedding task failed: {e}")))?
    }

    fn supports_embeddings(&self) -> bool {
        self.embed_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "candle"
    }
}
