pub mod openai;
pub mod prompt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use prompt::ConversationHistory;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Everything the completion provider needs for one chat turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub query: String,
    /// Primary context block, placed first in the prompt.
    pub context: String,
    /// Further context blocks, in order.
    pub additional_context: Vec<String>,
    pub history: ConversationHistory,
}

impl CompletionRequest {
    pub fn new(query: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: context.into(),
            ..Default::default()
        }
    }

    pub fn with_additional_context(mut self, block: impl Into<String>) -> Self {
        self.additional_context.push(block.into());
        self
    }

    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = history;
        self
    }
}

/// A source of chat completions.
///
/// Implementations make exactly one attempt per call and report every
/// failure as a `ProviderError`.
pub trait CompletionBackend: Send + Sync {
    fn generate_chat_response<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
}
