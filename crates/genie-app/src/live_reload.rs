//! Applies config reloads to a running orchestrator.

use genie_ai::ExecutionOrchestrator;
use genie_config::{diff, GenieConfig, SettingsChange};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::boot;

/// Follow `config_rx` until its sender goes away.
pub fn spawn(
    orchestrator: ExecutionOrchestrator,
    mut config_rx: watch::Receiver<GenieConfig>,
    mut current: GenieConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while config_rx.changed().await.is_ok() {
            let next = config_rx.borrow_and_update().clone();
            apply(&orchestrator, &current, &next);
            current = next;
        }
    })
}

/// Push every difference between `old` and `new` into the core.
pub fn apply(
    orchestrator: &ExecutionOrchestrator,
    old: &GenieConfig,
    new: &GenieConfig,
) -> Vec<SettingsChange> {
    let changes = diff(old, new);
    let mut settings_dirty = false;

    for change in &changes {
        match change {
            SettingsChange::MemorySizeChanged(size) => {
                orchestrator.memory().on_capacity_changed(*size);
                info!(size, "memory window resized");
            }
            SettingsChange::ProviderChanged(kind) => {
                boot::register_provider(orchestrator.resolver(), *kind, &new.providers);
            }
            SettingsChange::SamplingChanged | SettingsChange::SystemPromptChanged => {
                settings_dirty = true;
            }
            SettingsChange::ModelRulesChanged => match boot::policy_from(&new.providers) {
                Ok(policy) => orchestrator.resolver().set_policy(policy),
                Err(e) => warn!("keeping previous model rules: {e}"),
            },
            SettingsChange::WorkerPoolSizeChanged(size) => {
                warn!(size, "worker pool size changes apply after restart");
            }
        }
    }

    if settings_dirty {
        orchestrator.update_settings(boot::settings_from(&new.llm));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use genie_ai::{Message, Provider, SamplingConfig};
    use genie_common::{NotificationQueue, SessionKey};

    fn orchestrator(config: &GenieConfig) -> ExecutionOrchestrator {
        boot::build_orchestrator(config, Arc::new(NotificationQueue::default())).unwrap()
    }

    #[tokio::test]
    async fn memory_resize_reaches_open_sessions() {
        let old = GenieConfig::default();
        let orchestrator = orchestrator(&old);
        let session = SessionKey::new("project");
        orchestrator.open_session(&session);
        for i in 0..6 {
            orchestrator
                .memory()
                .append(&session, Message::user(format!("q{i}")))
                .unwrap();
        }

        let mut new = old.clone();
        new.llm.chat_memory_size = 3;
        let changes = apply(&orchestrator, &old, &new);

        assert_eq!(changes, vec![SettingsChange::MemorySizeChanged(3)]);
        assert_eq!(orchestrator.memory().capacity(&session), Some(3));
        assert_eq!(orchestrator.memory().len(&session), 3);
    }

    #[tokio::test]
    async fn provider_toggles_follow_config() {
        let old = GenieConfig::default();
        let orchestrator = orchestrator(&old);
        assert!(!orchestrator.resolver().is_registered(Provider::AzureOpenAi));

        let mut new = old.clone();
        new.providers.azure_openai.enabled = true;
        new.providers.azure_openai.endpoint = "https://res.openai.azure.com".into();
        new.providers.azure_openai.deployment = "prod".into();
        new.providers.azure_openai.api_key = "key".into();
        new.providers.ollama.enabled = false;
        apply(&orchestrator, &old, &new);

        assert!(orchestrator.resolver().is_registered(Provider::AzureOpenAi));
        assert!(!orchestrator.resolver().is_registered(Provider::Ollama));
    }

    #[tokio::test]
    async fn sampling_and_prompt_update_settings() {
        let old = GenieConfig::default();
        let orchestrator = orchestrator(&old);

        let mut new = old.clone();
        new.llm.temperature = 1.2;
        new.llm.system_prompt = "Answer in haiku.".into();
        new.llm.markdown_hint = false;
        apply(&orchestrator, &old, &new);

        let settings = orchestrator.settings();
        assert_eq!(settings.system_prompt, "Answer in haiku.");
        assert_eq!(settings.sampling.temperature, 1.2);
    }

    #[tokio::test]
    async fn model_rules_swap_policy() {
        let old = GenieConfig::default();
        let orchestrator = orchestrator(&old);
        let sampling = SamplingConfig::default();
        assert!(orchestrator.resolver().normalization("phi3", &sampling).supports_system_message);

        let mut new = old.clone();
        new.providers.no_system_role_models.push("^phi".into());
        apply(&orchestrator, &old, &new);
        assert!(!orchestrator.resolver().normalization("phi3", &sampling).supports_system_message);

        let mut broken = new.clone();
        broken.providers.no_system_role_models = vec!["[".into()];
        apply(&orchestrator, &new, &broken);
        assert!(!orchestrator.resolver().normalization("phi3", &sampling).supports_system_message);
    }

    #[tokio::test]
    async fn reload_loop_applies_published_configs() {
        let old = GenieConfig::default();
        let orchestrator = orchestrator(&old);
        let (tx, rx) = watch::channel(old.clone());
        let task = spawn(orchestrator.clone(), rx, old.clone());

        let mut new = old.clone();
        new.llm.chat_memory_size = 4;
        tx.send(new).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(orchestrator.memory().default_capacity(), 4);
    }
}
