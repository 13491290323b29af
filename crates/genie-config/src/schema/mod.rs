//! Configuration schema types for Genie.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults suited to a local-first setup.

mod execution;
mod llm;
mod providers;
mod system;

pub use execution::*;
pub use llm::*;
pub use providers::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Placeholder written over secrets in any user-visible dump.
pub const REDACTED: &str = "[REDACTED]";

/// Root configuration for Genie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GenieConfig {
    pub llm: LlmConfig,
    pub execution: ExecutionConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

impl GenieConfig {
    /// A copy with every non-empty API key replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.providers.redact();
        copy
    }
}
