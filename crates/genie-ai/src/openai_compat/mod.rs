//! OpenAI-compatible chat completions client.
//!
//! One client covers Ollama (`/v1/chat/completions`), OpenAI, and Azure
//! OpenAI deployments. They differ only in endpoint URL and auth header.

mod api;
mod client;
mod config;
mod retry;

pub use client::OpenAiCompatClient;
pub use config::{Auth, OpenAiCompatConfig};
