//! Genie configuration system.
//!
//! Provides TOML-based settings for the prompt orchestrator: system prompt,
//! memory window size, default sampling parameters, provider credentials and
//! base URLs. All sections use serde defaults so partial configs work out of
//! the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use genie_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod diff;
pub mod reload;
pub mod schema;
pub mod toml_loader;
pub mod validation;
pub mod watcher;

pub use diff::{diff, ProviderKind, SettingsChange};
pub use reload::ReloadManager;
pub use schema::{GenieConfig, CONFIG_SCHEMA_VERSION};
pub use watcher::ConfigWatcher;

use genie_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// Creates a commented default file if none exists.
pub fn load_config() -> Result<GenieConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &std::path::Path) -> Result<GenieConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string with secrets redacted.
pub fn config_to_json(config: &GenieConfig) -> String {
    serde_json::to_string_pretty(&config.redacted())
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let config = GenieConfig::default();
        let json = config_to_json(&config);
        assert!(json.contains("\"llm\""));
        assert!(json.contains("\"execution\""));
        assert!(json.contains("\"providers\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn config_to_json_redacts_api_keys() {
        let mut config = GenieConfig::default();
        config.providers.openai.api_key = "sk-very-secret".into();
        config.providers.azure_openai.api_key = "azure-secret".into();

        let json = config_to_json(&config);
        assert!(!json.contains("sk-very-secret"));
        assert!(!json.contains("azure-secret"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let config = GenieConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GenieConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.llm.chat_memory_size, 10);
        assert_eq!(parsed.execution.worker_pool_size, 4);
        assert_eq!(parsed.providers.ollama.base_url, "http://localhost:11434/");
    }
}
