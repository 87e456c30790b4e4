use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::error::LlmError;

/// Sentence-transformers style BERT encoder: mean pooling followed by L2 normalization.
#[derive(Clone)]
pub struct EmbedModel {
    model: Arc<BertModel>,
    tokenizer: Tokenizer,
    hidden_size: usize,
    device: Device,
}

impl std::fmt::Debug for EmbedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedModel")
            .field("hidden_size", &self.hidden_size)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl EmbedModel {
    /// Download (or reuse the cached) model files from the `HuggingFace` Hub and load them.
    ///
    /// # Errors
    ///
    /// Returns an error if download or loading fails.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, LlmError> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
        })?;
        let repo = api.model(repo_id.to_owned());
        let fetch = |name: &str| {
            repo.get(name).map_err(|e| {
                LlmError::ModelLoad(format!("failed to download {name} from {repo_id}: {e}"))
            })
        };

        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| LlmError::ModelLoad(format!("failed to read BERT config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_str)?;
        let hidden_size = serde_json::from_str::<serde_json::Value>(&config_str)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default();

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| LlmError::ModelLoad(format!("failed to load tokenizer: {e}")))?;

        // SAFETY: the safetensors file is owned by the hf-hub cache and not modified while mapped
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = BertModel::load(vb, &config)?;

        tracing::info!(repo = repo_id, hidden_size, "loaded BERT embedding model");
        Ok(Self {
            model: Arc::new(model),
            tokenizer,
            hidden_size,
            device: device.clone(),
        })
    }

    /// Output vector length, read from the model config.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.hidden_size
    }

    /// # Errors
    ///
    /// Returns an error if tokenization or the forward pass fails.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let token_ids = encoding.get_ids();
        let type_ids = vec![0_u32; token_ids.len()];
        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(type_ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&input_ids, &type_ids, None)?;

        let seq_len = u32::try_from(hidden.dim(1)?)
            .map_err(|e| LlmError::Inference(format!("sequence length overflow: {e}")))?;
        let pooled = (hidden.sum(1)? / f64::from(seq_len))?;
        let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norm)?.squeeze(0)?;

        normalized.to_vec1::<f32>().map_err(LlmError::Candle)
    }
}
