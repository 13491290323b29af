use regex::Regex;

use super::sampling::SamplingConfig;

pub const DEFAULT_REASONING_PATTERN: &str = "^o1-";

/// Model-family quirks applied when a handle is built.
///
/// Patterns match the lowercased model name.
#[derive(Debug, Clone)]
pub struct NormalizationPolicy {
    reasoning: Option<Regex>,
    no_system_role: Vec<Regex>,
}

/// What the policy decided for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub sampling: SamplingConfig,
    pub supports_system_message: bool,
    pub reasoning_model: bool,
}

impl NormalizationPolicy {
    /// Empty `reasoning_pattern` disables reasoning-model detection.
    pub fn new(reasoning_pattern: &str, no_system_role: &[String]) -> Result<Self, regex::Error> {
        let reasoning = if reasoning_pattern.is_empty() {
            None
        } else {
            Some(Regex::new(reasoning_pattern)?)
        };
        let no_system_role = no_system_role
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            reasoning,
            no_system_role,
        })
    }

    /// No rules at all: every model keeps its sampling and system role.
    pub fn permissive() -> Self {
        Self {
            reasoning: None,
            no_system_role: Vec::new(),
        }
    }

    pub fn is_reasoning_model(&self, model: &str) -> bool {
        let model = model.to_lowercase();
        self.reasoning.as_ref().is_some_and(|r| r.is_match(&model))
    }

    pub fn normalize(&self, model: &str, sampling: &SamplingConfig) -> Normalized {
        let lowered = model.to_lowercase();
        let reasoning_model = self.reasoning.as_ref().is_some_and(|r| r.is_match(&lowered));
        let rejects_system = self.no_system_role.iter().any(|r| r.is_match(&lowered));

        let mut sampling = sampling.clone();
        if reasoning_model {
            sampling.top_p = 1.0;
        }

        Normalized {
            sampling,
            supports_system_message: !(reasoning_model || rejects_system),
            reasoning_model,
        }
    }
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            reasoning: Regex::new(DEFAULT_REASONING_PATTERN).ok(),
            no_system_role: Regex::new("^gemma").ok().into_iter().collect(),
        }
    }
}
