//! Reading `config.toml` and bootstrapping it on first run.

mod loader;
mod paths;
mod template;


pub use loader::{load_default, load_from_path};
pub use paths::{create_default_config, default_config_path, ensure_config_file, CONFIG_ENV_VAR};
