mod boot;
mod chat;
mod cli;
mod live_reload;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use genie_common::{ConfigError, GenieError};
use genie_config::toml_loader::{default_config_path, ensure_config_file, load_from_path};
use genie_config::{GenieConfig, ReloadManager};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};

const FALLBACK_DIRECTIVE: &str = "genie=info";

fn init_logging(directive: &str) {
    let directive = directive
        .parse::<Directive>()
        .or_else(|_| FALLBACK_DIRECTIVE.parse::<Directive>());
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = directive {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The explicit `--config` path, or the platform default (created on first run).
fn config_path(args: &Args) -> Result<PathBuf, GenieError> {
    if let Some(path) = &args.config {
        return Ok(PathBuf::from(path));
    }
    let path = default_config_path()?;
    ensure_config_file(&path)?;
    Ok(path)
}

/// Missing or broken files fall back to defaults; an explicit path must exist.
fn read_config(path: &Path, explicit: bool) -> Result<GenieConfig, GenieError> {
    match load_from_path(path) {
        Ok(config) => Ok(config),
        Err(e @ ConfigError::FileNotFound(_)) if explicit => Err(e.into()),
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {e}");
            Ok(GenieConfig::default())
        }
    }
}

async fn run(args: Args) -> Result<(), GenieError> {
    let path = config_path(&args)?;
    let config = read_config(&path, args.config.is_some())?;

    let directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.directive().to_string());
    init_logging(&directive);
    tracing::info!("genie v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("config path: {}", path.display());

    match args.command {
        Command::Config => {
            println!("{}", genie_config::config_to_json(&config));
            Ok(())
        }
        Command::Models(models) => {
            let provider: Option<genie_ai::Provider> = models
                .provider
                .as_deref()
                .map(str::parse::<genie_ai::Provider>)
                .transpose()
                .map_err(|e: genie_ai::resolver::UnknownProvider| GenieError::Other(e.to_string()))?;
            let policy = boot::policy_from(&config.providers)?;
            let normalized = policy.normalize(&models.model, &boot::sampling_from(&config.llm));
            let report = serde_json::json!({
                "model": models.model,
                "provider": provider.map(|p| p.config_key()),
                "hosting": provider.map(|p| format!("{:?}", p.hosting())),
                "requires_api_key": provider.map(|p| p.requires_api_key()),
                "reasoning_model": normalized.reasoning_model,
                "system_message": normalized.supports_system_message,
                "temperature": normalized.sampling.temperature,
                "top_p": normalized.sampling.top_p,
                "max_tokens": normalized.sampling.max_tokens,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).map_err(|e| GenieError::Other(e.to_string()))?
            );
            Ok(())
        }
        Command::Chat(chat_args) => {
            let (config, config_rx) = ReloadManager::start(path).await;
            let options = chat::ChatOptions::resolve(&chat_args, &config.llm)?;
            let orchestrator = boot::build_orchestrator(&config, Arc::new(chat::ConsoleNotifier))?;
            let reload = live_reload::spawn(orchestrator.clone(), config_rx, config);

            let result = chat::run(orchestrator, options).await;
            reload.abort();
            tracing::info!("shutdown complete");
            result
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("genie: {e}");
            ExitCode::FAILURE
        }
    }
}
