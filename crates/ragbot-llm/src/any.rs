use std::sync::Arc;

#[cfg(feature = "candle")]
use crate::candle_provider::CandleProvider;
use crate::error::LlmError;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::provider::{EmbedBatchFuture, EmbedFuture, LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            #[cfg(feature = "candle")]
            AnyProvider::Candle($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    #[cfg(feature = "candle")]
    Candle(CandleProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Return a cloneable closure that calls `embed()` on this provider.
    pub fn embed_fn(&self) -> impl Fn(&str) -> EmbedFuture + Send + Sync + use<> {
        let provider = Arc::new(self.clone());
        move |text: &str| -> EmbedFuture {
            let p = Arc::clone(&provider);
            let owned = text.to_owned();
            Box::pin(async move { p.embed(&owned).await })
        }
    }

    /// Return a cloneable closure that calls `embed_batch()` on this provider.
    pub fn embed_batch_fn(&self) -> impl Fn(Vec<String>) -> EmbedBatchFuture + Send + Sync + use<> {
        let provider = Arc::new(self.clone());
        move |texts: Vec<String>| -> EmbedBatchFuture {
            let p = Arc::clone(&provider);
            Box::pin(async move { p.embed_batch(&texts).await })
        }
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_provider!(self, |p| p.embed_batch(texts).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_variant_delegates_name() {
        let provider = AnyProvider::Ollama(OllamaProvider::new(
            "http://127.0.0.1:1",
            "m".into(),
            "e".into(),
        ));
        assert_eq!(provider.name(), "ollama");
        assert!(provider.supports_embeddings());
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn mock_variant_delegates_chat_and_embed() {
        let provider = AnyProvider::Mock(MockProvider::with_responses(vec!["answer".into()]));
        assert_eq!(
            provider.chat(&[Message::user("q")]).await.unwrap(),
            "answer"
        );
        let vectors = provider
            .embed_batch(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn embed_fn_calls_provider() {
        let provider = AnyProvider::Mock(MockProvider::default().with_dimension(4));
        let embed = provider.embed_fn();
        let vector = embed("hello").await.unwrap();
        assert_eq!(vector.len(), 4);

        let embed_batch = provider.embed_batch_fn();
        let vectors = embed_batch(vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 3);
    }
}
