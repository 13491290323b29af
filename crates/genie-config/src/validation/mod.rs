//! Full configuration validation.
//!
//! Each section has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod llm;
mod providers;


use crate::schema::GenieConfig;
use genie_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &GenieConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    llm::validate_llm(&mut errors, config);
    llm::validate_execution(&mut errors, config);
    providers::validate_providers(&mut errors, config);
    providers::validate_model_rules(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
