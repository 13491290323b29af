//! Backend resolution: (provider, model, sampling) to a ready [`BackendHandle`].
//!
//! Providers are a closed sum type with a factory table filled at startup.
//! Handles are cached per (provider, model) and rebuilt when the requested
//! sampling parameters change.

mod cache;
mod policy;
mod provider;
mod sampling;

#[cfg(test)]
mod tests;

pub use cache::{BackendFactory, BackendHandle, BackendResolver, BackendSpec};
pub use policy::{Normalized, NormalizationPolicy, DEFAULT_REASONING_PATTERN};
pub use provider::{Hosting, Provider, UnknownProvider};
pub use sampling::SamplingConfig;

use genie_common::GenieError;

use crate::AiError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("no backend registered for provider {0}")]
    NoBackendForProvider(Provider),

    #[error("missing credentials for {provider}: {detail}")]
    MissingCredentials { provider: Provider, detail: String },

    #[error("failed to build backend: {0}")]
    Backend(#[from] AiError),
}

impl From<ResolveError> for GenieError {
    fn from(e: ResolveError) -> Self {
        GenieError::Backend(e.to_string())
    }
}
