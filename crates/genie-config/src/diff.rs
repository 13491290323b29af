//! Settings diffing.
//!
//! Turns two config snapshots into the change notifications the
//! orchestrator core reacts to (memory window resizes, provider rebuilds).

use crate::schema::GenieConfig;

/// A provider section in the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    AzureOpenAi,
}

/// One observable difference between two configs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    /// `llm.chat_memory_size` changed; carries the new size.
    MemorySizeChanged(usize),
    /// Credentials, base URL, or enablement of one provider changed.
    ProviderChanged(ProviderKind),
    /// Temperature, top_p, output tokens, retries, or timeout changed.
    SamplingChanged,
    SystemPromptChanged,
    /// Reasoning or no-system-role model patterns changed.
    ModelRulesChanged,
    /// Needs a restart to take effect.
    WorkerPoolSizeChanged(usize),
}

/// Compute the changes that take `old` to `new`, in a stable order.
pub fn diff(old: &GenieConfig, new: &GenieConfig) -> Vec<SettingsChange> {
    let mut changes = Vec::new();

    if old.llm.chat_memory_size != new.llm.chat_memory_size {
        changes.push(SettingsChange::MemorySizeChanged(
            new.llm.chat_memory_size as usize,
        ));
    }

    let (a, b) = (&old.providers, &new.providers);
    if a.ollama != b.ollama {
        changes.push(SettingsChange::ProviderChanged(ProviderKind::Ollama));
    }
    if a.openai != b.openai {
        changes.push(SettingsChange::ProviderChanged(ProviderKind::OpenAi));
    }
    if a.azure_openai != b.azure_openai {
        changes.push(SettingsChange::ProviderChanged(ProviderKind::AzureOpenAi));
    }

    let (a, b) = (&old.llm, &new.llm);
    if a.temperature != b.temperature
        || a.top_p != b.top_p
        || a.max_output_tokens != b.max_output_tokens
        || a.max_retries != b.max_retries
        || a.timeout_secs != b.timeout_secs
    {
        changes.push(SettingsChange::SamplingChanged);
    }
    if a.effective_system_prompt() != b.effective_system_prompt() {
        changes.push(SettingsChange::SystemPromptChanged);
    }

    if old.providers.reasoning_model_pattern != new.providers.reasoning_model_pattern
        || old.providers.no_system_role_models != new.providers.no_system_role_models
    {
        changes.push(SettingsChange::ModelRulesChanged);
    }

    if old.execution.worker_pool_size != new.execution.worker_pool_size {
        changes.push(SettingsChange::WorkerPoolSizeChanged(
            new.execution.worker_pool_size as usize,
        ));
    }

    changes
}
