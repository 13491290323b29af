//! Scripted in-process backend for orchestrator and strategy tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::resolver::{BackendSpec, ResolveError};
use crate::{AiError, ChatBackend, ChatResponse, Message, TokenUsage};

/// One scripted reaction to a backend call.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Reply(String),
    Fail(AiError),
    /// Streamed fragments; buffered calls get them joined.
    Tokens(Vec<String>),
    /// Never answers.
    Hang,
    Panic(&'static str),
}

#[derive(Debug)]
pub(crate) struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    delay: Duration,
    token_delay: Duration,
    usage: Option<TokenUsage>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            delay: Duration::ZERO,
            token_delay: Duration::ZERO,
            usage: None,
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(text: &str) -> Self {
        Self::new([Step::Reply(text.to_string())])
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    pub(crate) fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Message snapshots of every call, oldest first.
    pub(crate) fn received(&self) -> Vec<Vec<Message>> {
        self.received.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// A factory handing out this backend for any spec.
    pub(crate) fn factory(
        self: &Arc<Self>,
    ) -> impl Fn(&BackendSpec) -> Result<Arc<dyn ChatBackend>, ResolveError> + Send + Sync + 'static
    {
        let backend = Arc::clone(self);
        move |_spec: &BackendSpec| Ok(Arc::clone(&backend) as Arc<dyn ChatBackend>)
    }

    async fn next_step(&self, messages: &[Message]) -> Step {
        self.received.lock().unwrap().push(messages.to_vec());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::Reply("ok".into()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        step
    }

    fn respond(&self, content: String) -> ChatResponse {
        let response = ChatResponse::new(content);
        match self.usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, AiError> {
        match self.next_step(messages).await {
            Step::Reply(text) => Ok(self.respond(text)),
            Step::Tokens(tokens) => Ok(self.respond(tokens.concat())),
            Step::Fail(e) => Err(e),
            Step::Hang => std::future::pending().await,
            Step::Panic(msg) => panic!("{msg}"),
        }
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        on_token: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<ChatResponse, AiError> {
        match self.next_step(messages).await {
            Step::Reply(text) => {
                on_token(text.clone());
                Ok(self.respond(text))
            }
            Step::Tokens(tokens) => {
                for token in &tokens {
                    if !self.token_delay.is_zero() {
                        tokio::time::sleep(self.token_delay).await;
                    }
                    on_token(token.clone());
                }
                Ok(self.respond(tokens.concat()))
            }
            Step::Fail(e) => Err(e),
            Step::Hang => std::future::pending().await,
            Step::Panic(msg) => panic!("{msg}"),
        }
    }
}
