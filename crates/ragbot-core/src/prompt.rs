use std::path::{Path, PathBuf};

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "\
Use the following pieces of information to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.

Context: {context}
Question: {question}

Only return the helpful answer below and nothing else.
Helpful answer:
";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
    #[error("failed to read prompt template {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Prompt with `{context}` and `{question}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// # Errors
    ///
    /// Returns [`PromptError::MissingPlaceholder`] if either slot is absent.
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !template.contains(slot) {
                return Err(PromptError::MissingPlaceholder(slot));
            }
        }
        Ok(Self { template })
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks a slot.
    pub async fn load(path: &Path) -> Result<Self, PromptError> {
        let template = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PromptError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(template)
    }

    /// Substitutes both slots in a single pass, so a `{question}` inside the context stays literal.
    #[must_use]
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        loop {
            let next = [(CONTEXT_SLOT, context), (QUESTION_SLOT, question)]
                .into_iter()
                .filter_map(|(slot, value)| rest.find(slot).map(|at| (at, slot, value)))
                .min_by_key(|(at, _, _)| *at);
            let Some((at, slot, value)) = next else {
                out.push_str(rest);
                return out;
            };
            out.push_str(&rest[..at]);
            out.push_str(value);
            rest = &rest[at + slot.len()..];
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_owned(),
        }
    }
}
