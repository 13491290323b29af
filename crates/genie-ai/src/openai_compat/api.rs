//! ChatBackend implementation for OpenAiCompatClient (buffered + streaming).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::streaming::{parse_sse_stream, Flow, SseEvent};
use crate::{AiError, ChatBackend, ChatResponse, Message, TokenUsage};

use super::client::{status_error, transport_error, OpenAiCompatClient};
use super::retry::with_retries;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

impl OpenAiCompatClient {
    async fn send(&self, body: &Value) -> Result<reqwest::Response, AiError> {
        let response = self.request(body).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }
        Ok(response)
    }

    async fn chat_once(&self, body: &Value) -> Result<ChatResponse, AiError> {
        let response = self.send(body).await?;
        let json: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout
            } else {
                AiError::ParseError(e.to_string())
            }
        })?;
        self.parse_response(&json)
    }

    async fn stream_once(
        &self,
        body: &Value,
        on_token: &(dyn Fn(String) + Send + Sync),
        emitted: &AtomicBool,
    ) -> Result<ChatResponse, AiError> {
        let response = self.send(body).await?;

        let mut content = String::new();
        let mut usage: Option<TokenUsage> = None;
        let mut failure: Option<AiError> = None;

        parse_sse_stream(response, |event: SseEvent| {
            match OpenAiCompatClient::parse_stream_chunk(&event.data) {
                Ok(delta) if delta.done => return Flow::Stop,
                Ok(delta) => {
                    if let Some(text) = delta.text {
                        content.push_str(&text);
                        emitted.store(true, Ordering::SeqCst);
                        on_token(text);
                    }
                    if delta.usage.is_some() {
                        usage = delta.usage;
                    }
                }
                Err(AiError::ParseError(e)) => {
                    warn!("skipping malformed stream chunk: {e}");
                }
                Err(e) => {
                    failure = Some(e);
                    return Flow::Stop;
                }
            }
            Flow::Continue
        })
        .await?;

        if let Some(e) = failure {
            return Err(e);
        }
        let mut response = ChatResponse::new(content);
        if let Some(usage) = usage {
            response = response.with_usage(usage);
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, AiError> {
        let body = self.build_request_body(messages, false);
        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            messages = messages.len(),
            "chat request"
        );

        with_retries(
            self.config.sampling.max_retries,
            RETRY_BACKOFF,
            AiError::is_transient,
            |_| self.chat_once(&body),
        )
        .await
    }

    async fn chat_streaming(
        &self,
        messages: &[Message],
        on_token: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<ChatResponse, AiError> {
        let body = self.build_request_body(messages, true);
        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            messages = messages.len(),
            "streaming chat request"
        );

        // Once a token reached the caller a retry would duplicate text.
        let emitted = AtomicBool::new(false);
        let on_token: &(dyn Fn(String) + Send + Sync) = on_token.as_ref();
        with_retries(
            self.config.sampling.max_retries,
            RETRY_BACKOFF,
            |e| e.is_transient() && !emitted.load(Ordering::SeqCst),
            |_| self.stream_once(&body, on_token, &emitted),
        )
        .await
    }
}
