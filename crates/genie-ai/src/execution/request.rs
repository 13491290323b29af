use std::fmt;
use std::time::Duration;

use genie_common::SessionKey;

use crate::resolver::Provider;
use crate::{Attachment, TokenUsage};

/// Used when a request carries no timeout or a zero one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One user submission. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub session: SessionKey,
    pub prompt: String,
    pub provider: Provider,
    pub model: String,
    /// Opaque editor context, appended to the prompt as-is.
    pub context: Option<String>,
    pub attachments: Vec<Attachment>,
    pub timeout: Option<Duration>,
    pub streaming: bool,
}

impl CompletionRequest {
    pub fn new(
        session: SessionKey,
        prompt: impl Into<String>,
        provider: Provider,
        model: impl Into<String>,
    ) -> Self {
        Self {
            session,
            prompt: prompt.into(),
            provider,
            model: model.into(),
            context: None,
            attachments: Vec::new(),
            timeout: None,
            streaming: false,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn effective_timeout(&self) -> Duration {
        match self.timeout {
            Some(t) if !t.is_zero() => t,
            _ => DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    Backend(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("request timed out"),
            FailureReason::Backend(msg) => f.write_str(msg),
        }
    }
}

/// Terminal status of a run. Cancellation is never a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    Completed,
    Cancelled,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub request_id: String,
    /// Final assistant text; empty unless completed.
    pub text: String,
    pub status: CompletionStatus,
    pub duration: Duration,
    pub usage: Option<TokenUsage>,
}

impl CompletionResult {
    pub fn is_completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }
}
