use std::fmt;

use crate::resolver::{BackendSpec, Provider, ResolveError, SamplingConfig};

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    /// `Authorization: Bearer <key>`
    Bearer(String),
    /// `api-key: <key>` (Azure)
    ApiKeyHeader(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Auth::ApiKeyHeader(_) => f.write_str("ApiKeyHeader([REDACTED])"),
        }
    }
}

/// Everything needed to talk to one model on one server.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiCompatConfig {
    pub provider: Provider,
    /// Full chat-completions URL.
    pub url: String,
    pub auth: Auth,
    pub model: String,
    pub sampling: SamplingConfig,
}

impl OpenAiCompatConfig {
    /// Local Ollama server; `base_url` like `http://localhost:11434/`.
    pub fn ollama(base_url: &str, spec: &BackendSpec) -> Result<Self, ResolveError> {
        if base_url.trim().is_empty() {
            return Err(ResolveError::MissingCredentials {
                provider: spec.provider,
                detail: "base_url is empty".into(),
            });
        }
        Ok(Self::from_spec(
            spec,
            format!("{}v1/chat/completions", with_slash(base_url)),
            Auth::None,
        ))
    }

    /// OpenAI or any server speaking its API; `base_url` like
    /// `https://api.openai.com/v1/`.
    pub fn openai(base_url: &str, api_key: &str, spec: &BackendSpec) -> Result<Self, ResolveError> {
        let key = require_key(api_key, spec.provider)?;
        Ok(Self::from_spec(
            spec,
            format!("{}chat/completions", with_slash(base_url)),
            Auth::Bearer(key),
        ))
    }

    /// Azure OpenAI deployment. The model name only selects normalization;
    /// the deployment decides which model actually runs.
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: &str,
        spec: &BackendSpec,
    ) -> Result<Self, ResolveError> {
        if endpoint.trim().is_empty() || deployment.trim().is_empty() {
            return Err(ResolveError::MissingCredentials {
                provider: spec.provider,
                detail: "endpoint and deployment must be set".into(),
            });
        }
        let key = require_key(api_key, spec.provider)?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );
        Ok(Self::from_spec(spec, url, Auth::ApiKeyHeader(key)))
    }

    fn from_spec(spec: &BackendSpec, url: String, auth: Auth) -> Self {
        Self {
            provider: spec.provider,
            url,
            auth,
            model: spec.model.clone(),
            sampling: spec.sampling.clone(),
        }
    }
}

fn with_slash(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn require_key(api_key: &str, provider: Provider) -> Result<String, ResolveError> {
    let key = api_key.trim();
    if key.is_empty() {
        Err(ResolveError::MissingCredentials {
            provider,
            detail: "api_key is empty".into(),
        })
    } else {
        Ok(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(provider: Provider, model: &str) -> BackendSpec {
        BackendSpec {
            provider,
            model: model.into(),
            sampling: SamplingConfig::default(),
        }
    }

    #[test]
    fn ollama_url() {
        let config =
            OpenAiCompatConfig::ollama("http://localhost:11434", &spec(Provider::Ollama, "llama3.2"))
                .unwrap();
        assert_eq!(config.url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(config.auth, Auth::None);
        assert_eq!(config.model, "llama3.2");
    }

    #[test]
    fn openai_requires_key() {
        let s = spec(Provider::OpenAi, "gpt-4o");
        let err = OpenAiCompatConfig::openai("https://api.openai.com/v1/", " ", &s).unwrap_err();
        assert!(matches!(err, ResolveError::MissingCredentials { provider: Provider::OpenAi, .. }));

        let config = OpenAiCompatConfig::openai("https://api.openai.com/v1", "sk-1", &s).unwrap();
        assert_eq!(config.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(config.auth, Auth::Bearer("sk-1".into()));
    }

    #[test]
    fn azure_url_and_header() {
        let config = OpenAiCompatConfig::azure(
            "https://res.openai.azure.com/",
            "gpt4o-prod",
            "2024-02-01",
            "az-key",
            &spec(Provider::AzureOpenAi, "gpt-4o"),
        )
        .unwrap();
        assert_eq!(
            config.url,
            "https://res.openai.azure.com/openai/deployments/gpt4o-prod/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(config.auth, Auth::ApiKeyHeader("az-key".into()));

        let err = OpenAiCompatConfig::azure("", "d", "v", "k", &spec(Provider::AzureOpenAi, "m"));
        assert!(err.is_err());
    }

    #[test]
    fn debug_hides_keys() {
        let s = spec(Provider::OpenAi, "gpt-4o");
        let config = OpenAiCompatConfig::openai("https://x/", "sk-secret", &s).unwrap();
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
