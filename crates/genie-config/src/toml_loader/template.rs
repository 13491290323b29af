//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Genie Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[llm]
# system_prompt = "You are a software developer IDE assistant ..."
# markdown_hint = true        # append markdown formatting instructions
# chat_memory_size = 10       # 1-100 messages per session
# stream_mode = false
# temperature = 0.0           # 0.0-2.0
# top_p = 0.9                 # 0.0-1.0
# max_output_tokens = 4000
# max_retries = 1             # 0-10, transient failures only
# timeout_secs = 180          # 0 = 60 second fallback, max 3600
# default_provider = "ollama" # ollama, openai, azure_openai
# default_model = "llama3.2"

[execution]
# worker_pool_size = 4        # 1-64 concurrent backend calls

[providers]
# reasoning_model_pattern = "^o1-"
# no_system_role_models = ["^gemma"]

[providers.ollama]
# enabled = true
# base_url = "http://localhost:11434/"

[providers.openai]
# api_key = ""
# base_url = "https://api.openai.com/v1/"

[providers.azure_openai]
# enabled = false
# endpoint = "https://my-resource.openai.azure.com"
# deployment = ""
# api_key = ""
# api_version = "2024-02-01"

[logging]
# level = "info"              # trace, debug, info, warn, error
"##
    .to_string()
}
