//! Chat and embedding provider abstraction with Ollama and Candle backends.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle_provider;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::LlmError;
pub use provider::{EmbedBatchFuture, EmbedFuture, GenerationOptions, LlmProvider, Message, Role};
