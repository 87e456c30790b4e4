use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};

use crate::error::LlmError;
use crate::provider::GenerationOptions;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_new_tokens: usize,
    pub seed: u64,
    pub repeat_penalty: f32,
    pub repeat_last_n: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(GenerationOptions::default())
    }
}

impl From<GenerationOptions> for GenerationConfig {
    fn from(opts: GenerationOptions) -> Self {
        Self {
            temperature: opts.temperature,
            max_new_tokens: opts.max_new_tokens,
            seed: 42,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
        }
    }
}

impl GenerationConfig {
    fn sampling(&self) -> Sampling {
        if self.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            Sampling::All {
                temperature: self.temperature,
            }
        }
    }
}

pub struct GenerationOutput {
    pub text: String,
    pub tokens_generated: usize,
}

/// Sample up to `max_new_tokens` tokens after the prompt, stopping at `eos_token_id`.
///
/// `forward_fn(input, position)` runs the model over `input` starting at `position` and
/// returns logits for the last position.
///
/// # Errors
///
/// Returns an error if the forward pass or token decoding fails.
pub fn generate_tokens<F>(
    forward_fn: &mut F,
    tokenizer: &tokenizers::Tokenizer,
    prompt_tokens: &[u32],
    config: &GenerationConfig,
    eos_token_id: u32,
    device: &Device,
) -> Result<GenerationOutput, LlmError>
where
    F: FnMut(&Tensor, usize) -> Result<Tensor, LlmError>,
{
    if prompt_tokens.is_empty() {
        return Err(LlmError::Inference("empty prompt".into()));
    }

    let mut sampler = LogitsProcessor::from_sampling(config.seed, config.sampling());
    let mut history: Vec<u32> = prompt_tokens.to_vec();
    let mut generated: Vec<u32> = Vec::with_capacity(config.max_new_tokens);

    let mut input = Tensor::new(prompt_tokens, device)?.unsqueeze(0)?;
    let mut position = 0;

    while generated.len() < config.max_new_tokens {
        let step_len = input.dim(1)?;
        let logits = forward_fn(&input, position)?;
        let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
        let logits = if logits.dims().len() > 1 {
            logits.get(logits.dim(0)? - 1)?
        } else {
            logits
        };
        let logits = apply_repeat_penalty(
            &logits,
            &history,
            config.repeat_penalty,
            config.repeat_last_n,
        )?;

        let next = sampler.sample(&logits)?;
        if next == eos_token_id {
            break;
        }
        generated.push(next);
        history.push(next);

        position += step_len;
        input = Tensor::new(&[next], device)?.unsqueeze(0)?;
    }

    let text = tokenizer
        .decode(&generated, true)
        .map_err(|e| LlmError::Inference(format!("tokenizer decode failed: {e}")))?;
    Ok(GenerationOutput {
        text: text.trim().to_owned(),
        tokens_generated: generated.len(),
    })
}

fn apply_repeat_penalty(
    logits: &Tensor,
    tokens: &[u32],
    penalty: f32,
    last_n: usize,
) -> Result<Tensor, LlmError> {
    if (penalty - 1.0).abs() < f32::EPSILON {
        return Ok(logits.clone());
    }
    let start = tokens.len().saturating_sub(last_n);
    candle_transformers::utils::apply_repeat_penalty(logits, penalty, &tokens[start..])
        .map_err(LlmError::Candle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_generation_options() {
        let config = GenerationConfig::from(GenerationOptions {
            max_new_tokens: 512,
            temperature: 0.8,
        });
        assert_eq!(config.max_new_tokens, 512);
        assert!((config.temperature - 0.8).abs() < f64::EPSILON);
        assert!(matches!(config.sampling(), Sampling::All { .. }));
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let config = GenerationConfig {
            temperature: 0.0,
            ..GenerationConfig::default()
        };
        assert!(matches!(config.sampling(), Sampling::ArgMax));
    }

    #[test]
    fn repeat_penalty_no_op_when_one() {
        let logits = Tensor::new(&[1.0_f32, 2.0, 3.0], &Device::Cpu).unwrap();
        let result = apply_repeat_penalty(&logits, &[0, 1], 1.0, 64).unwrap();
        let vals: Vec<f32> = result.to_vec1().unwrap();
        assert_eq!(vals, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn repeat_penalty_dampens_recent_tokens() {
        let logits = Tensor::new(&[2.0_f32, 2.0, 2.0], &Device::Cpu).unwrap();
        let result = apply_repeat_penalty(&logits, &[1], 2.0, 64).unwrap();
        let vals: Vec<f32> = result.to_vec1().unwrap();
        assert!((vals[1] - 1.0).abs() < f32::EPSILON);
        assert!((vals[0] - 2.0).abs() < f32::EPSILON);
    }
}
