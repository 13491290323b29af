//! Provider section and model-rule validation.

use crate::schema::GenieConfig;

use super::helpers::validate_regex;

/// Provider names accepted in `llm.default_provider`, lowercase.
const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "azure_openai"];

pub(super) fn validate_providers(errors: &mut Vec<String>, config: &GenieConfig) {
    let default_provider = config.llm.default_provider.to_ascii_lowercase();
    if !KNOWN_PROVIDERS.contains(&default_provider.as_str()) {
        errors.push(format!(
            "llm.default_provider = {:?} must be one of {}",
            config.llm.default_provider,
            KNOWN_PROVIDERS.join(", ")
        ));
    }

    if config.providers.ollama.enabled && config.providers.ollama.base_url.trim().is_empty() {
        errors.push("providers.ollama.base_url must be set when ollama is enabled".into());
    }

    let azure = &config.providers.azure_openai;
    if azure.enabled {
        if azure.endpoint.trim().is_empty() {
            errors.push("providers.azure_openai.endpoint must be set when enabled".into());
        }
        if azure.deployment.trim().is_empty() {
            errors.push("providers.azure_openai.deployment must be set when enabled".into());
        }
    }
}

pub(super) fn validate_model_rules(errors: &mut Vec<String>, config: &GenieConfig) {
    let providers = &config.providers;
    validate_regex(
        errors,
        "providers.reasoning_model_pattern",
        &providers.reasoning_model_pattern,
    );
    for (i, pattern) in providers.no_system_role_models.iter().enumerate() {
        validate_regex(errors, &format!("providers.no_system_role_models[{i}]"), pattern);
    }
}
