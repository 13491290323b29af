//! Client struct, request building, and response parsing.

use std::time::Duration;

use serde_json::{json, Value};

use crate::prompt::render_content;
use crate::{AiError, ChatResponse, Message, TokenUsage};

use super::config::{Auth, OpenAiCompatConfig};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat-completions client for one model on one server.
pub struct OpenAiCompatClient {
    pub(crate) config: OpenAiCompatConfig,
    pub(crate) http: reqwest::Client,
}

/// One decoded streaming chunk.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct StreamDelta {
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
    pub done: bool,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, AiError> {
        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if !config.sampling.timeout.is_zero() {
            builder = builder.timeout(config.sampling.timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AiError::NetworkError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiCompatConfig {
        &self.config
    }

    pub(crate) fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        let request = self.http.post(&self.config.url).json(body);
        match &self.config.auth {
            Auth::None => request,
            Auth::Bearer(key) => request.bearer_auth(key),
            Auth::ApiKeyHeader(key) => request.header("api-key", key),
        }
    }

    pub(crate) fn build_request_body(&self, messages: &[Message], stream: bool) -> Value {
        let msgs: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": render_content(m),
                })
            })
            .collect();

        let sampling = &self.config.sampling;
        let mut body = json!({
            "model": self.config.model,
            "messages": msgs,
            "temperature": sampling.temperature,
            "top_p": sampling.top_p,
            "max_tokens": sampling.max_tokens,
        });
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        body
    }

    pub(crate) fn parse_response(&self, json: &Value) -> Result<ChatResponse, AiError> {
        let message = &json["choices"][0]["message"];
        if message.is_null() {
            return Err(AiError::ParseError("response has no choices".into()));
        }
        let content = message["content"].as_str().unwrap_or_default();
        let mut response = ChatResponse::new(content);
        if let Some(usage) = parse_usage(&json["usage"]) {
            response = response.with_usage(usage);
        }
        Ok(response)
    }

    /// Decode one SSE `data:` payload.
    pub(crate) fn parse_stream_chunk(data: &str) -> Result<StreamDelta, AiError> {
        let data = data.trim();
        if data == "[DONE]" {
            return Ok(StreamDelta {
                done: true,
                ..StreamDelta::default()
            });
        }
        let json: Value =
            serde_json::from_str(data).map_err(|e| AiError::ParseError(e.to_string()))?;
        if let Some(message) = json["error"]["message"].as_str() {
            return Err(AiError::ApiError(message.to_string()));
        }

        let choice = &json["choices"][0];
        Ok(StreamDelta {
            text: choice["delta"]["content"]
                .as_str()
                .filter(|t| !t.is_empty())
                .map(String::from),
            usage: parse_usage(&json["usage"]),
            done: false,
        })
    }
}

fn parse_usage(usage: &Value) -> Option<TokenUsage> {
    let input = usage["prompt_tokens"].as_u64();
    let output = usage["completion_tokens"].as_u64();
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TokenUsage::new(input.unwrap_or(0), output.unwrap_or(0)))
}

/// Map a non-success HTTP status to an error. Bodies are cut to 200 chars.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str) -> AiError {
    let body: String = body.chars().take(200).collect();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AiError::RateLimited
    } else if status.is_server_error() {
        AiError::ServerError(format!("HTTP {status}: {body}"))
    } else {
        AiError::ApiError(format!("HTTP {status}: {body}"))
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::NetworkError(e.to_string())
    }
}
