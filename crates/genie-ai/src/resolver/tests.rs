//! Tests for provider parsing, normalization, and the handle cache.

use super::*;
use crate::testing::ScriptedBackend;
use crate::ChatBackend;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_factory(
    builds: Arc<AtomicUsize>,
) -> impl Fn(&BackendSpec) -> Result<Arc<dyn ChatBackend>, ResolveError> + Send + Sync {
    move |_spec: &BackendSpec| {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedBackend::replying("hi")) as Arc<dyn ChatBackend>)
    }
}

#[test]
fn provider_parses_case_insensitively() {
    assert_eq!(Provider::from_str("OLLAMA").unwrap(), Provider::Ollama);
    assert_eq!(Provider::from_str("OpenAI").unwrap(), Provider::OpenAi);
    assert_eq!(Provider::from_str("azure_openai").unwrap(), Provider::AzureOpenAi);
    assert_eq!(Provider::from_str("Azure OpenAI").unwrap(), Provider::AzureOpenAi);
    assert!(Provider::from_str("bedrock").is_err());

    for provider in Provider::ALL {
        assert_eq!(Provider::from_str(provider.config_key()).unwrap(), provider);
        assert_eq!(Provider::from_str(&provider.to_string()).unwrap(), provider);
    }
}

#[test]
fn provider_metadata() {
    assert_eq!(Provider::Ollama.hosting(), Hosting::Local);
    assert_eq!(Provider::OpenAi.hosting(), Hosting::Cloud);
    assert_eq!(Provider::AzureOpenAi.hosting(), Hosting::Optional);
    assert!(!Provider::Ollama.requires_api_key());
    assert!(Provider::OpenAi.requires_api_key());
    assert_eq!(Provider::AzureOpenAi.display_name(), "Azure OpenAI");
}

#[test]
fn reasoning_models_get_top_p_one_and_no_system() {
    let policy = NormalizationPolicy::default();
    let sampling = SamplingConfig::default();

    let n = policy.normalize("o1-preview", &sampling);
    assert!(n.reasoning_model);
    assert!(!n.supports_system_message);
    assert_eq!(n.sampling.top_p, 1.0);
    assert_eq!(n.sampling.temperature, sampling.temperature);

    let n = policy.normalize("O1-Mini", &sampling);
    assert!(n.reasoning_model);

    let n = policy.normalize("gpt-4o", &sampling);
    assert!(!n.reasoning_model);
    assert!(n.supports_system_message);
    assert_eq!(n.sampling, sampling);
}

#[test]
fn no_system_role_models_keep_sampling() {
    let policy = NormalizationPolicy::default();
    let n = policy.normalize("gemma2:9b", &SamplingConfig::default());
    assert!(!n.supports_system_message);
    assert!(!n.reasoning_model);
    assert_eq!(n.sampling.top_p, 0.9);
}

#[test]
fn custom_policy_patterns() {
    let policy = NormalizationPolicy::new("^(o1|o3)-", &["^phi".to_string()]).unwrap();
    assert!(policy.is_reasoning_model("o3-mini"));
    assert!(!policy.normalize("phi3", &SamplingConfig::default()).supports_system_message);
    assert!(policy.normalize("gemma", &SamplingConfig::default()).supports_system_message);

    assert!(NormalizationPolicy::new("(", &[]).is_err());
    assert!(!NormalizationPolicy::permissive().is_reasoning_model("o1-preview"));
    assert!(!NormalizationPolicy::new("", &[]).unwrap().is_reasoning_model("o1-x"));
}

#[test]
fn missing_factory_is_a_configuration_error() {
    let resolver = BackendResolver::default();
    let err = resolver
        .resolve(Provider::OpenAi, "gpt-4o", &SamplingConfig::default())
        .unwrap_err();
    assert_eq!(err, ResolveError::NoBackendForProvider(Provider::OpenAi));
    assert_eq!(err.to_string(), "no backend registered for provider OpenAI");
}

#[test]
fn handles_are_cached_per_provider_and_model() {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = BackendResolver::default();
    resolver.register(Provider::Ollama, counting_factory(Arc::clone(&builds)));
    let sampling = SamplingConfig::default();

    let a = resolver.resolve(Provider::Ollama, "llama3.2", &sampling).unwrap();
    let b = resolver.resolve(Provider::Ollama, "llama3.2", &sampling).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    resolver.resolve(Provider::Ollama, "qwen2.5", &sampling).unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(resolver.cached_len(), 2);
}

#[test]
fn changed_sampling_rebuilds_handle() {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = BackendResolver::default();
    resolver.register(Provider::Ollama, counting_factory(Arc::clone(&builds)));

    let first = resolver
        .resolve(Provider::Ollama, "llama3.2", &SamplingConfig::default())
        .unwrap();
    let warmer = SamplingConfig {
        temperature: 0.8,
        ..SamplingConfig::default()
    };
    let second = resolver.resolve(Provider::Ollama, "llama3.2", &warmer).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.sampling().temperature, 0.8);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(resolver.cached_len(), 1);
}

#[test]
fn reasoning_handle_is_normalized_but_cache_keys_on_request() {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = BackendResolver::default();
    resolver.register(Provider::OpenAi, counting_factory(Arc::clone(&builds)));
    let sampling = SamplingConfig::default();

    let handle = resolver.resolve(Provider::OpenAi, "o1-preview", &sampling).unwrap();
    assert_eq!(handle.sampling().top_p, 1.0);
    assert!(!handle.supports_system_message());

    resolver.resolve(Provider::OpenAi, "o1-preview", &sampling).unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn invalidate_drops_only_that_provider() {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = BackendResolver::default();
    resolver.register(Provider::Ollama, counting_factory(Arc::clone(&builds)));
    resolver.register(Provider::OpenAi, counting_factory(Arc::clone(&builds)));
    let sampling = SamplingConfig::default();

    resolver.resolve(Provider::Ollama, "llama3.2", &sampling).unwrap();
    resolver.resolve(Provider::OpenAi, "gpt-4o", &sampling).unwrap();

    assert_eq!(resolver.invalidate(Provider::Ollama), 1);
    assert_eq!(resolver.cached_len(), 1);
    assert_eq!(resolver.invalidate(Provider::Ollama), 0);
}

#[test]
fn reregistering_invalidates() {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = BackendResolver::default();
    resolver.register(Provider::Ollama, counting_factory(Arc::clone(&builds)));
    resolver
        .resolve(Provider::Ollama, "llama3.2", &SamplingConfig::default())
        .unwrap();

    resolver.register(Provider::Ollama, counting_factory(Arc::clone(&builds)));
    assert_eq!(resolver.cached_len(), 0);

    assert!(resolver.unregister(Provider::Ollama));
    assert!(!resolver.is_registered(Provider::Ollama));
}

#[test]
fn factory_errors_propagate_and_are_not_cached() {
    let resolver = BackendResolver::default();
    resolver.register(Provider::AzureOpenAi, |spec: &BackendSpec| {
        Err::<Arc<dyn ChatBackend>, _>(ResolveError::MissingCredentials {
            provider: spec.provider,
            detail: "api_key is empty".into(),
        })
    });

    let err = resolver
        .resolve(Provider::AzureOpenAi, "gpt-4o", &SamplingConfig::default())
        .unwrap_err();
    assert!(matches!(err, ResolveError::MissingCredentials { .. }));
    assert_eq!(resolver.cached_len(), 0);
}

#[test]
fn set_policy_clears_cache() {
    let builds = Arc::new(AtomicUsize::new(0));
    let resolver = BackendResolver::default();
    resolver.register(Provider::Ollama, counting_factory(Arc::clone(&builds)));
    let handle = resolver
        .resolve(Provider::Ollama, "gemma2", &SamplingConfig::default())
        .unwrap();
    assert!(!handle.supports_system_message());

    resolver.set_policy(NormalizationPolicy::permissive());
    assert_eq!(resolver.cached_len(), 0);
    let handle = resolver
        .resolve(Provider::Ollama, "gemma2", &SamplingConfig::default())
        .unwrap();
    assert!(handle.supports_system_message());
}

#[test]
fn slow_build_does_not_block_other_providers() {
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    let (release, gate) = mpsc::channel::<()>();
    let (entered_tx, entered) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let entered_tx = Mutex::new(entered_tx);

    let resolver = Arc::new(BackendResolver::default());
    resolver.register(Provider::Ollama, move |_spec: &BackendSpec| {
        entered_tx.lock().unwrap().send(()).unwrap();
        gate.lock().unwrap().recv().unwrap();
        Ok(Arc::new(ScriptedBackend::replying("slow")) as Arc<dyn ChatBackend>)
    });
    resolver.register(
        Provider::OpenAi,
        counting_factory(Arc::new(AtomicUsize::new(0))),
    );

    let slow = {
        let resolver = Arc::clone(&resolver);
        std::thread::spawn(move || {
            resolver
                .resolve(Provider::Ollama, "llama3.2", &SamplingConfig::default())
                .map(|h| h.model().to_string())
        })
    };
    entered.recv_timeout(Duration::from_secs(5)).unwrap();

    let fast = resolver
        .resolve(Provider::OpenAi, "gpt-4o", &SamplingConfig::default())
        .unwrap();
    assert_eq!(fast.provider(), Provider::OpenAi);
    assert_eq!(resolver.cached_len(), 1);

    release.send(()).unwrap();
    assert_eq!(slow.join().unwrap().unwrap(), "llama3.2");
    assert_eq!(resolver.cached_len(), 2);
}

#[test]
fn build_racing_invalidation_is_not_cached() {
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    let (release, gate) = mpsc::channel::<()>();
    let (entered_tx, entered) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let entered_tx = Mutex::new(entered_tx);

    let resolver = Arc::new(BackendResolver::default());
    resolver.register(Provider::Ollama, move |_spec: &BackendSpec| {
        entered_tx.lock().unwrap().send(()).unwrap();
        gate.lock().unwrap().recv().unwrap();
        Ok(Arc::new(ScriptedBackend::replying("old")) as Arc<dyn ChatBackend>)
    });

    let slow = {
        let resolver = Arc::clone(&resolver);
        std::thread::spawn(move || {
            resolver
                .resolve(Provider::Ollama, "llama3.2", &SamplingConfig::default())
                .is_ok()
        })
    };
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    resolver.invalidate_all();

    release.send(()).unwrap();
    assert!(slow.join().unwrap());
    assert_eq!(resolver.cached_len(), 0);
}
