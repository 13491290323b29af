//! Prompt, sampling, and execution validation.

use crate::schema::GenieConfig;

use super::helpers::{validate_range, validate_range_f64};

pub(super) fn validate_llm(errors: &mut Vec<String>, config: &GenieConfig) {
    let llm = &config.llm;
    validate_range(errors, "llm.chat_memory_size", llm.chat_memory_size, 1, 100);
    validate_range_f64(errors, "llm.temperature", llm.temperature, 0.0, 2.0);
    validate_range_f64(errors, "llm.top_p", llm.top_p, 0.0, 1.0);
    validate_range(errors, "llm.max_output_tokens", llm.max_output_tokens, 1, u32::MAX);
    validate_range(errors, "llm.max_retries", llm.max_retries, 0, 10);
    validate_range(errors, "llm.timeout_secs", llm.timeout_secs, 0, 3600);

    if llm.default_model.trim().is_empty() {
        errors.push("llm.default_model must not be empty".into());
    }
}

pub(super) fn validate_execution(errors: &mut Vec<String>, config: &GenieConfig) {
    validate_range(
        errors,
        "execution.worker_pool_size",
        config.execution.worker_pool_size,
        1,
        64,
    );
}
