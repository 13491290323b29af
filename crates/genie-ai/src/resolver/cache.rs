use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use super::policy::{Normalized, NormalizationPolicy};
use super::provider::Provider;
use super::sampling::SamplingConfig;
use super::ResolveError;
use crate::ChatBackend;

/// Everything a factory needs to build one backend. Sampling is already
/// normalized for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSpec {
    pub provider: Provider,
    pub model: String,
    pub sampling: SamplingConfig,
}

/// Builds backends for one provider.
pub trait BackendFactory: Send + Sync {
    fn build(&self, spec: &BackendSpec) -> Result<Arc<dyn ChatBackend>, ResolveError>;
}

impl<F> BackendFactory for F
where
    F: Fn(&BackendSpec) -> Result<Arc<dyn ChatBackend>, ResolveError> + Send + Sync,
{
    fn build(&self, spec: &BackendSpec) -> Result<Arc<dyn ChatBackend>, ResolveError> {
        self(spec)
    }
}

/// A resolved backend bound to one (provider, model, sampling) tuple.
/// Immutable once built.
pub struct BackendHandle {
    spec: BackendSpec,
    supports_system_message: bool,
    backend: Arc<dyn ChatBackend>,
}

impl BackendHandle {
    pub fn provider(&self) -> Provider {
        self.spec.provider
    }

    pub fn model(&self) -> &str {
        &self.spec.model
    }

    /// Normalized sampling the backend was built with.
    pub fn sampling(&self) -> &SamplingConfig {
        &self.spec.sampling
    }

    pub fn supports_system_message(&self) -> bool {
        self.supports_system_message
    }

    pub fn backend(&self) -> &dyn ChatBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("provider", &self.spec.provider)
            .field("model", &self.spec.model)
            .field("sampling", &self.spec.sampling)
            .field("supports_system_message", &self.supports_system_message)
            .finish_non_exhaustive()
    }
}

struct CachedHandle {
    /// Sampling as requested, before normalization.
    requested: SamplingConfig,
    handle: Arc<BackendHandle>,
}

/// Maps provider selections to cached backend handles.
pub struct BackendResolver {
    factories: RwLock<HashMap<Provider, Arc<dyn BackendFactory>>>,
    cache: Mutex<HashMap<(Provider, String), CachedHandle>>,
    /// Bumped whenever cached handles are dropped. A build that straddles a
    /// bump is handed out but not cached.
    generation: AtomicU64,
    policy: RwLock<NormalizationPolicy>,
}

impl BackendResolver {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            policy: RwLock::new(policy),
        }
    }

    /// Install or replace the factory for `provider`. Cached handles for
    /// that provider are dropped.
    pub fn register(&self, provider: Provider, factory: impl BackendFactory + 'static) {
        self.factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(provider, Arc::new(factory));
        self.invalidate(provider);
        info!(provider = %provider, "backend factory registered");
    }

    pub fn unregister(&self, provider: Provider) -> bool {
        let removed = self
            .factories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&provider)
            .is_some();
        self.invalidate(provider);
        removed
    }

    pub fn is_registered(&self, provider: Provider) -> bool {
        self.factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&provider)
    }

    /// Return the cached handle for `(provider, model)`, building one if the
    /// cache has none or it was built with different sampling. Factories run
    /// without the cache lock held.
    pub fn resolve(
        &self,
        provider: Provider,
        model: &str,
        sampling: &SamplingConfig,
    ) -> Result<Arc<BackendHandle>, ResolveError> {
        let key = (provider, model.to_string());
        let generation = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(&key) {
                if cached.requested == *sampling {
                    return Ok(Arc::clone(&cached.handle));
                }
                debug!(provider = %provider, model, "sampling changed, rebuilding backend");
            }
            self.generation.load(Ordering::Acquire)
        };

        let factory = self
            .factories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&provider)
            .cloned()
            .ok_or(ResolveError::NoBackendForProvider(provider))?;

        let normalized = self.normalization(model, sampling);
        let spec = BackendSpec {
            provider,
            model: model.to_string(),
            sampling: normalized.sampling,
        };
        let backend = factory.build(&spec)?;
        let handle = Arc::new(BackendHandle {
            spec,
            supports_system_message: normalized.supports_system_message,
            backend,
        });

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(&key) {
            if cached.requested == *sampling {
                return Ok(Arc::clone(&cached.handle));
            }
        }
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(provider = %provider, model, "cache invalidated during build, not caching");
            return Ok(handle);
        }
        info!(
            provider = %provider,
            model,
            system_message = handle.supports_system_message,
            "backend resolved"
        );
        cache.insert(
            key,
            CachedHandle {
                requested: sampling.clone(),
                handle: Arc::clone(&handle),
            },
        );
        Ok(handle)
    }

    /// Drop cached handles for `provider`. Returns how many were dropped.
    pub fn invalidate(&self, provider: Provider) -> usize {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = cache.len();
        cache.retain(|(p, _), _| *p != provider);
        let dropped = before - cache.len();
        if dropped > 0 {
            debug!(provider = %provider, dropped, "backend cache invalidated");
        }
        dropped
    }

    pub fn invalidate_all(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache.clear();
    }

    /// Swap the normalization rules. Every cached handle is dropped.
    pub fn set_policy(&self, policy: NormalizationPolicy) {
        *self.policy.write().unwrap_or_else(|e| e.into_inner()) = policy;
        self.invalidate_all();
    }

    /// What the current policy would do to `model`, without building anything.
    pub fn normalization(&self, model: &str, sampling: &SamplingConfig) -> Normalized {
        self.policy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .normalize(model, sampling)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for BackendResolver {
    fn default() -> Self {
        Self::new(NormalizationPolicy::default())
    }
}
