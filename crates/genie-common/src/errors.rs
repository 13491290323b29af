use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("config watch error: {0}")]
    WatchError(String),
}

/// Top-level error for the `genie` binary and anything that spans crates.
///
/// Core errors (`genie_ai::SubmitError` and friends) are folded in as strings
/// so this crate stays a leaf of the dependency graph.
#[derive(Debug, thiserror::Error)]
pub enum GenieError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("llm.top_p = 3 is out of range".into());
        assert_eq!(
            err.to_string(),
            "config validation error: llm.top_p = 3 is out of range"
        );

        let err = ConfigError::WatchError("inotify limit reached".into());
        assert_eq!(err.to_string(), "config watch error: inotify limit reached");
    }

    #[test]
    fn genie_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: GenieError = config_err.into();
        assert!(matches!(err, GenieError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn genie_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: GenieError = io_err.into();
        assert!(matches!(err, GenieError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn genie_error_other_variants() {
        let err = GenieError::Backend("no backend registered for provider Ollama".into());
        assert_eq!(
            err.to_string(),
            "backend error: no backend registered for provider Ollama"
        );

        let err = GenieError::Session("session not initialized: abc".into());
        assert_eq!(err.to_string(), "session error: session not initialized: abc");

        let err = GenieError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
