//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for the genie crates at this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "genie=trace",
            LogLevel::Debug => "genie=debug",
            LogLevel::Info => "genie=info",
            LogLevel::Warn => "genie=warn",
            LogLevel::Error => "genie=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
