//! Provider credentials, base URLs, and model-family rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::REDACTED;

/// Local Ollama server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434/".into(),
        }
    }
}

/// OpenAI cloud API.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1/".into(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &REDACTED)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Azure OpenAI deployment. Optional provider, off by default.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureOpenAiConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            deployment: String::new(),
            api_key: String::new(),
            api_version: "2024-02-01".into(),
        }
    }
}

impl fmt::Debug for AzureOpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureOpenAiConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_key", &REDACTED)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// All provider sections plus the model-family normalization rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub azure_openai: AzureOpenAiConfig,
    /// Regex matched against the lowercased model name; matching models get
    /// `top_p = 1.0` and no system message.
    pub reasoning_model_pattern: String,
    /// Regexes for models that reject the system role.
    pub no_system_role_models: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
            azure_openai: AzureOpenAiConfig::default(),
            reasoning_model_pattern: "^o1-".into(),
            no_system_role_models: vec!["^gemma".into()],
        }
    }
}

impl ProvidersConfig {
    pub(crate) fn redact(&mut self) {
        for key in [&mut self.openai.api_key, &mut self.azure_openai.api_key] {
            if !key.is_empty() {
                *key = REDACTED.into();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_keys() {
        let openai = OpenAiConfig {
            api_key: "sk-123".into(),
            ..OpenAiConfig::default()
        };
        let azure = AzureOpenAiConfig {
            api_key: "az-456".into(),
            ..AzureOpenAiConfig::default()
        };
        assert!(!format!("{openai:?}").contains("sk-123"));
        assert!(!format!("{azure:?}").contains("az-456"));
    }

    #[test]
    fn defaults_cover_reasoning_and_system_role_rules() {
        let providers = ProvidersConfig::default();
        assert_eq!(providers.reasoning_model_pattern, "^o1-");
        assert!(providers.no_system_role_models.iter().any(|p| p == "^gemma"));
        assert!(!providers.azure_openai.enabled);
    }
}
