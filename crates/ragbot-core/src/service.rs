use std::future::Future;
use std::pin::Pin;

pub type QaServiceError = Box<dyn std::error::Error + Send + Sync>;

pub type AnswerFuture<'a> = Pin<Box<dyn Future<Output = Result<QaReply, QaServiceError>> + Send + 'a>>;

/// Answer produced for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaReply {
    pub answer: String,
    /// Ids of the index records the answer was grounded on.
    pub sources: Vec<String>,
}

/// Question answering backend the `/get` endpoint delegates to.
pub trait QaService: Send + Sync {
    fn answer<'a>(&'a self, question: &'a str) -> AnswerFuture<'a>;
}
