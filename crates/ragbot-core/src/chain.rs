use ragbot_llm::{LlmProvider, Message};

use crate::error::QaError;
use crate::prompt::PromptTemplate;
use crate::retriever::{RetrievedChunk, Retriever};
use crate::service::{AnswerFuture, QaReply, QaService};

/// Chain output: the model's answer plus the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct QaAnswer {
    pub result: String,
    pub source_documents: Vec<RetrievedChunk>,
}

/// "Stuff" retrieval QA: every retrieved chunk goes into a single prompt.
pub struct RetrievalQa<P> {
    retriever: Retriever,
    llm: P,
    prompt: PromptTemplate,
}

impl<P: LlmProvider> RetrievalQa<P> {
    pub fn new(retriever: Retriever, llm: P, prompt: PromptTemplate) -> Self {
        Self {
            retriever,
            llm,
            prompt,
        }
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[must_use]
    pub fn llm(&self) -> &P {
        &self.llm
    }

    /// Retrieve, render the prompt and ask the model.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or generation fails.
    pub async fn invoke(&self, query: &str) -> Result<QaAnswer, QaError> {
        let source_documents = self.retriever.retrieve(query).await?;
        let context = source_documents
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self.prompt.render(&context, query);

        let result = self
            .llm
            .chat(&[Message::user(prompt)])
            .await
            .map_err(QaError::Generation)?;
        tracing::debug!(
            provider = self.llm.name(),
            sources = source_documents.len(),
            "generated answer"
        );

        Ok(QaAnswer {
            result,
            source_documents,
        })
    }
}

impl<P: LlmProvider> QaService for RetrievalQa<P> {
    fn answer<'a>(&'a self, question: &'a str) -> AnswerFuture<'a> {
        Box::pin(async move {
            let answer = self.invoke(question).await?;
            Ok(QaReply {
                answer: answer.result,
                sources: answer.source_documents.into_iter().map(|c| c.id).collect(),
            })
        })
    }
}
