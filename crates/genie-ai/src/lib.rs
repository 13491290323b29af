//! Prompt orchestration core for Genie.
//!
//! Turns a user request plus editor context into one LLM completion or a
//! live token stream, while keeping a bounded conversation per session:
//! - [`ConversationMemoryStore`]: per-session sliding-window history
//! - [`BackendResolver`]: (provider, model) to a ready backend handle, with
//!   model-family normalization
//! - [`ExecutionOrchestrator`]: per-session serialization, submit-to-cancel,
//!   timeouts, and rollback
//! - buffered and streaming strategies with a stop-safe [`StreamConsumer`]
//! - an OpenAI-compatible HTTP backend for Ollama, OpenAI, and Azure OpenAI

pub mod execution;
pub mod memory;
pub mod openai_compat;
pub mod prompt;
pub mod resolver;
pub mod streaming;
pub mod token_tracker;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

pub use execution::{
    CompletionRequest, CompletionResult, CompletionStatus, ExecutionHandle, ExecutionOrchestrator,
    ExecutionState, FailureReason, OrchestratorSettings, StreamCallbacks, StreamConsumer,
    StreamPhase, StreamSink, SubmitError, Submission, WorkerPool,
};
pub use memory::{ConversationMemoryStore, ConversationWindow, MemoryError};
pub use openai_compat::{OpenAiCompatClient, OpenAiCompatConfig};
pub use resolver::{
    BackendFactory, BackendHandle, BackendResolver, BackendSpec, Hosting, NormalizationPolicy,
    Provider, ResolveError, SamplingConfig,
};
pub use token_tracker::TokenTracker;

/// A chat-completion capability: one concrete provider/model binding.
///
/// Implementations carry their own sampling parameters and retry policy;
/// callers only pass the conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, AiError>;

    /// Stream the reply, calling `on_token` for each text fragment as it
    /// arrives. The returned response holds the full text.
    async fn chat_streaming(
        &self,
        messages: &[Message],
        on_token: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<ChatResponse, AiError>;
}

/// A file excerpt attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub path: String,
    pub excerpt: String,
}

impl Attachment {
    pub fn new(path: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            excerpt: excerpt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Same role and identical text. Attachments are ignored.
    pub fn same_turn(&self, other: &Message) -> bool {
        self.role == other.role && self.content == other.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AiError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout")]
    Timeout,
}

impl AiError {
    /// Whether a retry of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AiError::ServerError(_) | AiError::RateLimited | AiError::NetworkError(_) | AiError::Timeout
        )
    }
}
