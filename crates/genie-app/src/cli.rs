use clap::{Args as ClapArgs, Parser, Subcommand};

/// Genie: a prompt orchestrator for local and cloud LLMs.
#[derive(Parser, Debug)]
#[command(name = "genie", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level override (e.g. `genie=debug`, `warn`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat. Ctrl-C stops the reply in progress.
    Chat(ChatArgs),
    /// Print the effective configuration as JSON, keys redacted.
    Config,
    /// Show how a model is normalized before it is called.
    Models(ModelsArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct ChatArgs {
    /// Provider (ollama, openai, azure_openai). Defaults to the config.
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model name. Defaults to the config.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Stream tokens as they arrive.
    #[arg(long)]
    pub stream: bool,

    /// Conversation key. Defaults to the current directory.
    #[arg(long)]
    pub session: Option<String>,

    /// Editor context sent along with every prompt.
    #[arg(long)]
    pub context: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct ModelsArgs {
    /// Model name to inspect.
    pub model: String,

    #[arg(short, long)]
    pub provider: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
