//! Turning a TOML file into a [`GenieConfig`].

use std::path::Path;

use genie_common::ConfigError;
use tracing::{info, warn};

use super::paths::{default_config_path, ensure_config_file};
use crate::schema::GenieConfig;
use crate::validation;

/// Parse TOML text. Missing keys take their defaults.
fn parse(content: &str) -> Result<GenieConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))
}

/// Read and parse `path`.
///
/// Out-of-range values are reported with `warn!` but still returned;
/// [`crate::load_config_from`] is the strict variant.
pub fn load_from_path(path: &Path) -> Result<GenieConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    let config = parse(&content)?;
    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), "{e}");
    }
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load from [`default_config_path`], writing the template first if the
/// file does not exist yet.
pub fn load_default() -> Result<GenieConfig, ConfigError> {
    let path = default_config_path()?;
    if ensure_config_file(&path)? {
        return Ok(GenieConfig::default());
    }
    load_from_path(&path)
}
