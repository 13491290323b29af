//! Interactive chat loop on stdin/stdout.

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use genie_ai::{
    CompletionRequest, CompletionStatus, ExecutionOrchestrator, FailureReason, Provider,
    StreamSink, SubmitError, Submission, TokenUsage,
};
use genie_common::{GenieError, Notification, NotificationLevel, NotificationSink, SessionKey};
use genie_config::schema::LlmConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::cli::ChatArgs;

/// Resolved chat options: CLI flags over config defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub session: SessionKey,
    pub provider: Provider,
    pub model: String,
    pub streaming: bool,
    pub context: Option<String>,
    pub timeout: Duration,
}

impl ChatOptions {
    pub fn resolve(args: &ChatArgs, llm: &LlmConfig) -> Result<Self, GenieError> {
        let provider_name = args.provider.as_deref().unwrap_or(&llm.default_provider);
        let provider =
            Provider::from_str(provider_name).map_err(|e| GenieError::Other(e.to_string()))?;

        let session = match &args.session {
            Some(key) => SessionKey::new(key.as_str()),
            None => std::env::current_dir()
                .map(|dir| SessionKey::new(dir.display().to_string()))
                .unwrap_or_else(|_| SessionKey::new("default")),
        };

        Ok(Self {
            session,
            provider,
            model: args.model.clone().unwrap_or_else(|| llm.default_model.clone()),
            streaming: args.stream || llm.stream_mode,
            context: args.context.clone().filter(|c| !c.trim().is_empty()),
            timeout: Duration::from_secs(u64::from(llm.timeout_secs)),
        })
    }

    fn request(&self, prompt: &str) -> CompletionRequest {
        let mut request =
            CompletionRequest::new(self.session.clone(), prompt, self.provider, self.model.clone())
                .with_timeout(self.timeout)
                .streaming(self.streaming);
        if let Some(context) = &self.context {
            request = request.with_context(context.clone());
        }
        request
    }
}

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Prompt(&'a str),
    Clear,
    History,
    Usage,
    Help,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/clear" => Input::Clear,
        "/history" => Input::History,
        "/usage" => Input::Usage,
        "/help" => Input::Help,
        prompt => Input::Prompt(prompt),
    }
}

const HELP: &str = "/clear  forget this conversation\n\
/history  show remembered messages\n\
/usage  token usage so far\n\
/quit  leave\n\
Ctrl-C while a reply is running stops it.";

/// Prints replies to stdout.
struct ConsoleSink {
    streaming: bool,
    printed: AtomicBool,
}

impl StreamSink for ConsoleSink {
    fn on_token(&self, token: &str) {
        self.printed.store(true, Ordering::Relaxed);
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{token}");
        let _ = out.flush();
    }

    fn on_complete(&self, text: &str, usage: Option<TokenUsage>) {
        if !self.streaming || !self.printed.load(Ordering::Relaxed) {
            print!("{text}");
        }
        println!();
        if let Some(usage) = usage {
            debug!(
                input = usage.input_tokens,
                output = usage.output_tokens,
                "reply usage"
            );
        }
    }

    fn on_error(&self, _reason: &FailureReason) {
        // The notification printer reports the failure itself.
        if self.printed.load(Ordering::Relaxed) {
            println!();
        }
    }
}

/// Prints notifications to stderr.
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        let level = match notification.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        eprintln!("[{level}] {}: {}", notification.title, notification.body);
    }
}

/// Fail before the first prompt if the selected backend cannot be built,
/// e.g. a disabled provider or a missing API key.
pub fn check_backend(orchestrator: &ExecutionOrchestrator, options: &ChatOptions) -> Result<(), GenieError> {
    orchestrator.resolver().resolve(
        options.provider,
        &options.model,
        &orchestrator.settings().sampling,
    )?;
    Ok(())
}

pub async fn run(orchestrator: ExecutionOrchestrator, options: ChatOptions) -> Result<(), GenieError> {
    check_backend(&orchestrator, &options)?;
    orchestrator.open_session(&options.session);
    info!(
        session = %options.session,
        provider = %options.provider,
        model = %options.model,
        streaming = options.streaming,
        "chat started"
    );
    println!(
        "genie: {} / {} (type /help for commands)",
        options.provider, options.model
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Clear => {
                orchestrator.memory().clear(&options.session);
                println!("(conversation cleared)");
            }
            Input::History => {
                let messages = orchestrator.memory().messages(&options.session).unwrap_or_default();
                for message in messages {
                    println!("[{}] {}", message.role.as_str(), message.content);
                }
            }
            Input::Usage => {
                let usage = orchestrator.token_usage();
                println!(
                    "{} calls, {} input + {} output tokens",
                    usage.call_count(),
                    usage.total().input_tokens,
                    usage.total().output_tokens
                );
            }
            Input::Prompt(prompt) => ask(&orchestrator, &options, prompt).await?,
        }
    }
    println!();
    Ok(())
}

async fn ask(
    orchestrator: &ExecutionOrchestrator,
    options: &ChatOptions,
    prompt: &str,
) -> Result<(), GenieError> {
    let sink = Arc::new(ConsoleSink {
        streaming: options.streaming,
        printed: AtomicBool::new(false),
    });
    let handle = match orchestrator.submit_with_sink(options.request(prompt), sink) {
        Ok(Submission::Started(handle)) => handle,
        Ok(Submission::CancelledInFlight { request_id }) => {
            println!("(stopped {request_id})");
            return Ok(());
        }
        // Already reported through the notification sink.
        Err(SubmitError::Resolve(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let wait = handle.wait();
    tokio::pin!(wait);
    let result = loop {
        tokio::select! {
            result = &mut wait => break result,
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    orchestrator.cancel(&options.session);
                }
            }
        }
    };

    if result.status == CompletionStatus::Cancelled {
        println!("\n(stopped)");
    }
    debug!(
        request_id = %result.request_id,
        elapsed_ms = result.duration.as_millis() as u64,
        "reply finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_prompts() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/clear\n"), Input::Clear);
        assert_eq!(parse_input(" explain this "), Input::Prompt("explain this"));
        assert_eq!(parse_input("/unknown"), Input::Prompt("/unknown"));
    }

    #[test]
    fn flags_override_config() {
        let llm = LlmConfig::default();
        let args = ChatArgs {
            provider: Some("Azure OpenAI".into()),
            model: Some("gpt-4o".into()),
            stream: true,
            session: Some("proj".into()),
            context: Some("  ".into()),
        };
        let options = ChatOptions::resolve(&args, &llm).unwrap();
        assert_eq!(options.provider, Provider::AzureOpenAi);
        assert_eq!(options.model, "gpt-4o");
        assert!(options.streaming);
        assert_eq!(options.session, SessionKey::new("proj"));
        assert_eq!(options.context, None);
    }

    #[test]
    fn config_supplies_defaults() {
        let llm = LlmConfig {
            stream_mode: true,
            timeout_secs: 0,
            ..LlmConfig::default()
        };
        let options = ChatOptions::resolve(&ChatArgs::default(), &llm).unwrap();
        assert_eq!(options.provider, Provider::Ollama);
        assert_eq!(options.model, llm.default_model);
        assert!(options.streaming);

        let request = options.request("hi");
        assert_eq!(request.effective_timeout(), genie_ai::execution::DEFAULT_TIMEOUT);
        assert!(request.streaming);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let args = ChatArgs {
            provider: Some("bard".into()),
            ..ChatArgs::default()
        };
        let err = ChatOptions::resolve(&args, &LlmConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "unknown provider: bard");
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_first_prompt() {
        let config = genie_config::GenieConfig::default();
        let orchestrator = crate::boot::build_orchestrator(
            &config,
            Arc::new(genie_common::NotificationQueue::new(4)),
        )
        .unwrap();
        let args = ChatArgs {
            provider: Some("openai".into()),
            model: Some("gpt-4o".into()),
            ..ChatArgs::default()
        };
        let options = ChatOptions::resolve(&args, &config.llm).unwrap();

        let err = check_backend(&orchestrator, &options).unwrap_err();
        assert!(matches!(err, GenieError::Backend(_)));
        assert!(err.to_string().contains("missing credentials"), "{err}");
    }
}
