use std::time::Duration;

/// Sampling and transport parameters baked into a backend handle.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    /// Transport timeout of one backend call. Zero disables it.
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.9,
            max_tokens: 4000,
            timeout: Duration::from_secs(180),
            max_retries: 1,
        }
    }
}
