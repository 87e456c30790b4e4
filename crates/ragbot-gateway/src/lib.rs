//! HTTP surface for the chatbot: static chat page, `/get` question endpoint, health check.

mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{DEFAULT_MAX_BODY_SIZE, GatewayServer};
pub use ragbot_core::service::{AnswerFuture, QaReply, QaService, QaServiceError};
