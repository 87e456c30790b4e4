use std::path::{Path, PathBuf};

use candle_core::Device;
use candle_core::quantized::gguf_file;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;

use crate::error::LlmError;

/// Where the quantized chat model comes from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A GGUF file on disk; `tokenizer.json` is expected next to it unless given explicitly.
    Local {
        path: PathBuf,
        tokenizer: Option<PathBuf>,
    },
    HuggingFace {
        repo_id: String,
        filename: Option<String>,
        tokenizer_repo: Option<String>,
    },
}

pub struct LoadedModel {
    pub weights: ModelWeights,
    pub tokenizer: Tokenizer,
    pub eos_token_id: u32,
}

/// Load a GGUF llama-family chat model and its tokenizer.
///
/// # Errors
///
/// Returns an error if the files cannot be fetched, parsed, or loaded onto `device`.
pub fn load_chat_model(source: &ModelSource, device: &Device) -> Result<LoadedModel, LlmError> {
    let (model_path, tokenizer_path) = match source {
        ModelSource::Local { path, tokenizer } => {
            let tokenizer_path = match tokenizer {
                Some(t) => t.clone(),
                None => path
                    .parent()
                    .map(|p| p.join("tokenizer.json"))
                    .ok_or_else(|| {
                        LlmError::ModelLoad(format!("invalid model path: {}", path.display()))
                    })?,
            };
            (path.clone(), tokenizer_path)
        }
        ModelSource::HuggingFace {
            repo_id,
            filename,
            tokenizer_repo,
        } => {
            let api = hf_hub::api::sync::Api::new().map_err(|e| {
                LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
            })?;
            let model_filename = filename.as_deref().unwrap_or("model.gguf");
            let model_path = api.model(repo_id.clone()).get(model_filename).map_err(|e| {
                LlmError::ModelLoad(format!(
                    "failed to download {model_filename} from {repo_id}: {e}"
                ))
            })?;
            // GGUF-only repos usually ship no tokenizer; fetch it from the base model repo.
            let tok_repo = tokenizer_repo.as_deref().unwrap_or(repo_id);
            let tokenizer_path = api
                .model(tok_repo.to_owned())
                .get("tokenizer.json")
                .map_err(|e| {
                    LlmError::ModelLoad(format!(
                        "failed to download tokenizer.json from {tok_repo}: {e}"
                    ))
                })?;
            (model_path, tokenizer_path)
        }
    };

    let weights = load_gguf_weights(&model_path, device)?;
    let tokenizer = load_tokenizer(&tokenizer_path)?;
    let eos_token_id = resolve_eos_token(&tokenizer);
    tracing::info!(
        model = %model_path.display(),
        eos_token_id,
        "loaded GGUF chat model"
    );
    Ok(LoadedModel {
        weights,
        tokenizer,
        eos_token_id,
    })
}

fn load_gguf_weights(path: &Path, device: &Device) -> Result<ModelWeights, LlmError> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        LlmError::ModelLoad(format!("failed to open GGUF file {}: {e}", path.display()))
    })?;
    let content = gguf_file::Content::read(&mut file)
        .map_err(|e| LlmError::ModelLoad(format!("failed to parse GGUF file: {e}")))?;
    ModelWeights::from_gguf(content, &mut file, device)
        .map_err(|e| LlmError::ModelLoad(format!("failed to load model weights from GGUF: {e}")))
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer, LlmError> {
    Tokenizer::from_file(path).map_err(|e| {
        LlmError::ModelLoad(format!(
            "failed to load tokenizer from {}: {e}",
            path.display()
        ))
    })
}

fn resolve_eos_token(tokenizer: &Tokenizer) -> u32 {
    const EOS_CANDIDATES: &[&str] = &["</s>", "<|eot_id|>", "<|im_end|>", "<|endoftext|>"];

    EOS_CANDIDATES
        .iter()
        .find_map(|candidate| tokenizer.token_to_id(candidate))
        // token id 2 is </s> in the llama vocabulary
        .unwrap_or(2)
}
