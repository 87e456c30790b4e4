use crate::provider::{Message, Role};

/// Prompt layout expected by the loaded chat model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTemplate {
    /// `[INST] <<SYS>> ... <</SYS>> ... [/INST]`, used by Llama 2 chat checkpoints.
    Llama2,
    /// Message contents joined by newlines, for base (non-chat) checkpoints.
    Raw,
}

impl ChatTemplate {
    #[must_use]
    pub fn parse_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "llama2" | "llama" | "llama-2" => Self::Llama2,
            _ => Self::Raw,
        }
    }

    #[must_use]
    pub fn format(&self, messages: &[Message]) -> String {
        match self {
            Self::Llama2 => format_llama2(messages),
            Self::Raw => format_raw(messages),
        }
    }
}

fn format_llama2(messages: &[Message]) -> String {
    let mut out = String::new();
    let mut pending_system: Option<&str> = None;

    for msg in messages {
        match msg.role {
            Role::System => pending_system = Some(&msg.content),
            Role::User => {
                out.push_str("<s>[INST] ");
                if let Some(system) = pending_system.take() {
                    out.push_str("<<SYS>>\n");
                    out.push_str(system);
                    out.push_str("\n<</SYS>>\n\n");
                }
                out.push_str(&msg.content);
                out.push_str(" [/INST]");
            }
            Role::Assistant => {
                out.push(' ');
                out.push_str(&msg.content);
                out.push_str(" </s>");
            }
        }
    }
    out
}

fn format_raw(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
