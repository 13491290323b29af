//! Execution settings: worker pool sizing.

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Concurrent backend calls across all sessions (valid range: 1-64).
    pub worker_pool_size: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
        }
    }
}
