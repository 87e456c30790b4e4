//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::provider::{LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub dimension: usize,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            dimension: 384,
            supports_embeddings: true,
            fail_chat: false,
            fail_embed: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Every message list passed to `chat`, in call order.
    #[must_use]
    pub fn recorded_prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }

    /// Deterministic embedding: a bag of byte values folded into `dimension` buckets.
    fn embedding_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension.max(1)];
        let len = vector.len();
        for (i, byte) in text.bytes().enumerate() {
            vector[(usize::from(byte) + i) % len] += 1.0;
        }
        if text.is_empty() {
            vector[0] = 1.0;
        }
        vector
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        if !self.supports_embeddings {
            return Err(crate::LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        if self.fail_embed {
            return Err(crate::LlmError::Other("mock embedding error".into()));
        }
        Ok(self.embedding_for(text))
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
