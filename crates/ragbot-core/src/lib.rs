//! Configuration, prompt template, retriever, the retrieval-QA chain and the service seam
//! front-ends call into.

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod error;
pub mod prompt;
pub mod retriever;
pub mod secret;
pub mod service;

pub use chain::{QaAnswer, RetrievalQa};
pub use config::Config;
pub use error::QaError;
pub use prompt::{PromptError, PromptTemplate};
pub use retriever::{RetrievedChunk, Retriever};
pub use secret::Secret;
pub use service::{AnswerFuture, QaReply, QaService, QaServiceError};
