//! LLM defaults: system prompt, memory window, and sampling parameters.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a software developer IDE assistant with expert knowledge in any programming language.\n\
Do not include any more info which might be incorrect.\n\
Only provide info that is correct and relevant to the code or plugin.\n";

/// Appended to the system prompt when `markdown_hint` is on.
pub const MARKDOWN_HINT: &str = "\nAlways use markdown to format your prompt. For example, use **bold** or *italic* text and ``` code blocks ```.";

/// Prompt, memory, and sampling settings shared by every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub system_prompt: String,
    pub markdown_hint: bool,
    /// Maximum number of messages retained per session (valid range: 1-100).
    pub chat_memory_size: u32,
    pub stream_mode: bool,
    /// Valid range: 0.0-2.0.
    pub temperature: f64,
    /// Valid range: 0.0-1.0.
    pub top_p: f64,
    pub max_output_tokens: u32,
    /// Retries of transient backend failures, baked into each backend handle.
    pub max_retries: u32,
    /// Per-request timeout in seconds; 0 means the 60-second fallback.
    pub timeout_secs: u32,
    pub default_provider: String,
    pub default_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            markdown_hint: true,
            chat_memory_size: 10,
            stream_mode: false,
            temperature: 0.0,
            top_p: 0.9,
            max_output_tokens: 4000,
            max_retries: 1,
            timeout_secs: 180,
            default_provider: "ollama".into(),
            default_model: "llama3.2".into(),
        }
    }
}

impl LlmConfig {
    /// The system prompt exactly as it is injected into a fresh session.
    pub fn effective_system_prompt(&self) -> String {
        if self.markdown_hint {
            format!("{}{}", self.system_prompt, MARKDOWN_HINT)
        } else {
            self.system_prompt.clone()
        }
    }
}
