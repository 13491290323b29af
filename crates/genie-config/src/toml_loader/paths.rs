//! Where the config file lives, and writing the commented template.

use std::path::{Path, PathBuf};

use genie_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

/// Overrides the platform default location when set and non-empty.
pub const CONFIG_ENV_VAR: &str = "GENIE_CONFIG";

/// `$GENIE_CONFIG`, else `<platform config dir>/genie/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    config_path_from(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn config_path_from(env_override: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = env_override.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("genie").join("config.toml"))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Write the commented default config to `path`, creating parent dirs.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |what: &str, p: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("failed to {what} {}: {e}", p.display()))
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err("create", dir, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_err("write", path, e))?;
    info!(path = %path.display(), "wrote default config");
    Ok(())
}

/// Create the template at `path` unless something is already there.
/// Returns `true` if a file was written.
pub fn ensure_config_file(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    create_default_config(path)?;
    Ok(true)
}
