use std::fmt;
use std::str::FromStr;

/// Where a provider runs, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hosting {
    /// On this machine; no credentials.
    Local,
    Cloud,
    /// Cloud provider that is off unless configured.
    Optional,
}

/// Known LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Ollama,
    OpenAi,
    AzureOpenAi,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Ollama, Provider::OpenAi, Provider::AzureOpenAi];

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama",
            Provider::OpenAi => "OpenAI",
            Provider::AzureOpenAi => "Azure OpenAI",
        }
    }

    /// Key used in config files and on the command line.
    pub fn config_key(self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAi => "openai",
            Provider::AzureOpenAi => "azure_openai",
        }
    }

    pub fn hosting(self) -> Hosting {
        match self {
            Provider::Ollama => Hosting::Local,
            Provider::OpenAi => Hosting::Cloud,
            Provider::AzureOpenAi => Hosting::Optional,
        }
    }

    pub fn requires_api_key(self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    /// Case-insensitive; accepts config keys and display names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            "azureopenai" | "azure" => Ok(Provider::AzureOpenAi),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}
