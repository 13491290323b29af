//! Token usage tracking across sessions and providers.

use std::collections::HashMap;

use genie_common::SessionKey;

use crate::resolver::Provider;
use crate::TokenUsage;

/// Cumulative usage of one provider or session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub usage: TokenUsage,
    pub calls: u64,
}

impl UsageTotals {
    fn add(&mut self, usage: &TokenUsage) {
        self.usage.input_tokens = self.usage.input_tokens.saturating_add(usage.input_tokens);
        self.usage.output_tokens = self.usage.output_tokens.saturating_add(usage.output_tokens);
        self.calls += 1;
    }
}

/// Tracks cumulative token usage per provider and per session.
#[derive(Debug, Clone, Default)]
pub struct TokenTracker {
    total: UsageTotals,
    by_provider: HashMap<Provider, UsageTotals>,
    by_session: HashMap<SessionKey, UsageTotals>,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call.
    pub fn record(&mut self, provider: Provider, session: &SessionKey, usage: &TokenUsage) {
        self.total.add(usage);
        self.by_provider.entry(provider).or_default().add(usage);
        self.by_session.entry(session.clone()).or_default().add(usage);
    }

    pub fn total(&self) -> &TokenUsage {
        &self.total.usage
    }

    pub fn total_tokens(&self) -> u64 {
        self.total.usage.total_tokens()
    }

    pub fn call_count(&self) -> u64 {
        self.total.calls
    }

    pub fn for_provider(&self, provider: Provider) -> Option<&UsageTotals> {
        self.by_provider.get(&provider)
    }

    pub fn for_session(&self, session: &SessionKey) -> Option<&UsageTotals> {
        self.by_session.get(session)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
