//! Wires a [`GenieConfig`] into the orchestrator core.

use std::sync::Arc;
use std::time::Duration;

use genie_ai::{
    BackendResolver, BackendSpec, ChatBackend, ConversationMemoryStore, ExecutionOrchestrator,
    NormalizationPolicy, OpenAiCompatClient, OpenAiCompatConfig, OrchestratorSettings, Provider,
    ResolveError, SamplingConfig, WorkerPool,
};
use genie_common::{ConfigError, GenieError, NotificationSink};
use genie_config::schema::{LlmConfig, ProvidersConfig};
use genie_config::{GenieConfig, ProviderKind};
use tracing::info;

pub fn provider_for(kind: ProviderKind) -> Provider {
    match kind {
        ProviderKind::Ollama => Provider::Ollama,
        ProviderKind::OpenAi => Provider::OpenAi,
        ProviderKind::AzureOpenAi => Provider::AzureOpenAi,
    }
}

pub fn sampling_from(llm: &LlmConfig) -> SamplingConfig {
    SamplingConfig {
        temperature: llm.temperature,
        top_p: llm.top_p,
        max_tokens: llm.max_output_tokens,
        timeout: Duration::from_secs(u64::from(llm.timeout_secs)),
        max_retries: llm.max_retries,
    }
}

pub fn settings_from(llm: &LlmConfig) -> OrchestratorSettings {
    OrchestratorSettings {
        system_prompt: llm.effective_system_prompt(),
        sampling: sampling_from(llm),
    }
}

pub fn policy_from(providers: &ProvidersConfig) -> Result<NormalizationPolicy, GenieError> {
    NormalizationPolicy::new(
        &providers.reasoning_model_pattern,
        &providers.no_system_role_models,
    )
    .map_err(|e| ConfigError::ValidationError(format!("model rules: {e}")).into())
}

/// Install, replace, or remove the backend factory for one provider section.
pub fn register_provider(resolver: &BackendResolver, kind: ProviderKind, providers: &ProvidersConfig) {
    let provider = provider_for(kind);
    match kind {
        ProviderKind::Ollama if providers.ollama.enabled => {
            let base_url = providers.ollama.base_url.clone();
            resolver.register(provider, move |spec: &BackendSpec| {
                connect(OpenAiCompatConfig::ollama(&base_url, spec)?)
            });
        }
        ProviderKind::OpenAi => {
            let openai = providers.openai.clone();
            resolver.register(provider, move |spec: &BackendSpec| {
                connect(OpenAiCompatConfig::openai(
                    &openai.base_url,
                    &openai.api_key,
                    spec,
                )?)
            });
        }
        ProviderKind::AzureOpenAi if providers.azure_openai.enabled => {
            let azure = providers.azure_openai.clone();
            resolver.register(provider, move |spec: &BackendSpec| {
                connect(OpenAiCompatConfig::azure(
                    &azure.endpoint,
                    &azure.deployment,
                    &azure.api_version,
                    &azure.api_key,
                    spec,
                )?)
            });
        }
        _ => {
            if resolver.unregister(provider) {
                info!(provider = %provider, "provider disabled");
            }
        }
    }
}

pub fn register_all(resolver: &BackendResolver, providers: &ProvidersConfig) {
    for kind in [ProviderKind::Ollama, ProviderKind::OpenAi, ProviderKind::AzureOpenAi] {
        register_provider(resolver, kind, providers);
    }
}

fn connect(config: OpenAiCompatConfig) -> Result<Arc<dyn ChatBackend>, ResolveError> {
    let client: Arc<dyn ChatBackend> = Arc::new(OpenAiCompatClient::new(config)?);
    Ok(client)
}

/// Build the full core from config. Must run inside a tokio runtime.
pub fn build_orchestrator(
    config: &GenieConfig,
    notifications: Arc<dyn NotificationSink>,
) -> Result<ExecutionOrchestrator, GenieError> {
    let memory = Arc::new(ConversationMemoryStore::new(
        config.llm.chat_memory_size as usize,
    ));
    let resolver = Arc::new(BackendResolver::new(policy_from(&config.providers)?));
    register_all(&resolver, &config.providers);

    let pool = WorkerPool::from_current(config.execution.worker_pool_size as usize)
        .map_err(|e| GenieError::Other(format!("no async runtime: {e}")))?;

    info!(
        memory = config.llm.chat_memory_size,
        workers = pool.size(),
        "orchestrator ready"
    );
    Ok(
        ExecutionOrchestrator::builder(memory, resolver, pool)
            .settings(settings_from(&config.llm))
            .notification_sink(notifications)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use genie_common::NotificationQueue;

    fn queue() -> Arc<dyn NotificationSink> {
        Arc::new(NotificationQueue::default())
    }

    #[test]
    fn sampling_mirrors_llm_section() {
        let llm = LlmConfig {
            temperature: 0.7,
            top_p: 0.5,
            max_output_tokens: 256,
            max_retries: 3,
            timeout_secs: 30,
            ..LlmConfig::default()
        };
        let sampling = sampling_from(&llm);
        assert_eq!(sampling.temperature, 0.7);
        assert_eq!(sampling.top_p, 0.5);
        assert_eq!(sampling.max_tokens, 256);
        assert_eq!(sampling.max_retries, 3);
        assert_eq!(sampling.timeout, Duration::from_secs(30));
    }

    #[test]
    fn settings_carry_markdown_hint() {
        let llm = LlmConfig::default();
        assert_eq!(settings_from(&llm).system_prompt, llm.effective_system_prompt());
    }

    #[test]
    fn provider_kinds_map_one_to_one() {
        assert_eq!(provider_for(ProviderKind::Ollama), Provider::Ollama);
        assert_eq!(provider_for(ProviderKind::OpenAi), Provider::OpenAi);
        assert_eq!(provider_for(ProviderKind::AzureOpenAi), Provider::AzureOpenAi);
    }

    #[test]
    fn bad_model_rules_are_config_errors() {
        let providers = ProvidersConfig {
            no_system_role_models: vec!["(".into()],
            ..ProvidersConfig::default()
        };
        let err = policy_from(&providers).unwrap_err();
        assert!(matches!(err, GenieError::Config(ConfigError::ValidationError(_))));
    }

    #[test]
    fn disabled_providers_are_not_registered() {
        let resolver = BackendResolver::new(NormalizationPolicy::default());
        register_all(&resolver, &ProvidersConfig::default());
        assert!(resolver.is_registered(Provider::Ollama));
        assert!(resolver.is_registered(Provider::OpenAi));
        assert!(!resolver.is_registered(Provider::AzureOpenAi));

        let mut providers = ProvidersConfig::default();
        providers.ollama.enabled = false;
        register_provider(&resolver, ProviderKind::Ollama, &providers);
        assert!(!resolver.is_registered(Provider::Ollama));
    }

    #[test]
    fn openai_without_key_fails_at_resolve() {
        let resolver = BackendResolver::new(NormalizationPolicy::default());
        register_all(&resolver, &ProvidersConfig::default());
        let err = resolver
            .resolve(Provider::OpenAi, "gpt-4o", &SamplingConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingCredentials { provider: Provider::OpenAi, .. }
        ));
    }

    #[test]
    fn ollama_resolves_without_network() {
        let resolver = BackendResolver::new(NormalizationPolicy::default());
        register_all(&resolver, &ProvidersConfig::default());
        let handle = resolver
            .resolve(Provider::Ollama, "gemma2", &SamplingConfig::default())
            .unwrap();
        assert_eq!(handle.model(), "gemma2");
        assert!(!handle.supports_system_message());
    }

    #[tokio::test]
    async fn orchestrator_uses_config_sizes() {
        let mut config = GenieConfig::default();
        config.llm.chat_memory_size = 6;
        config.execution.worker_pool_size = 2;

        let orchestrator = build_orchestrator(&config, queue()).unwrap();
        assert_eq!(orchestrator.memory().default_capacity(), 6);
        assert_eq!(orchestrator.pool().size(), 2);
        assert_eq!(orchestrator.settings(), settings_from(&config.llm));
    }
}
