//! Tier 1: keyword matching. Fast, deterministic, no external calls — the
//! floor every higher tier builds on.

use veritas_contracts::{error::VeritasResult, risk::UserRiskProfile, turn::GuardrailAction};

use crate::{config::GuardrailConfig, Guardrail};

/// Blocks on a configured blocklist, redirects on a configured emergency
/// list, and otherwise allows. Case-insensitive substring matching — the
/// same "simple, explainable, declarative" posture `TomlPolicyEngine` takes
/// for its action/resource rules, applied here to free text instead.
pub struct SimpleGuardrail {
    config: GuardrailConfig,
}

impl SimpleGuardrail {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    fn contains_any(haystack: &str, needles: &[String]) -> Option<String> {
        let lower = haystack.to_lowercase();
        needles.iter().find(|needle| lower.contains(needle.as_str())).cloned()
    }
}

#[async_trait::async_trait]
impl Guardrail for SimpleGuardrail {
    async fn check_input(&self, text: &str, _risk: &mut UserRiskProfile) -> VeritasResult<GuardrailAction> {
        if let Some(hit) = Self::contains_any(text, &self.config.blocked_keywords) {
            tracing::warn!(keyword = %hit, "tier 1 blocked input");
            return Ok(GuardrailAction::Block);
        }
        if let Some(hit) = Self::contains_any(text, &self.config.emergency_keywords) {
            tracing::warn!(keyword = %hit, "tier 1 redirecting input to emergency guidance");
            return Ok(GuardrailAction::Redirect);
        }
        Ok(GuardrailAction::Allow)
    }

    async fn check_output(&self, text: &str) -> VeritasResult<GuardrailAction> {
        if let Some(hit) = Self::contains_any(text, &self.config.blocked_output_phrases) {
            tracing::warn!(phrase = %hit, "tier 1 blocked output");
            return Ok(GuardrailAction::Block);
        }
        Ok(GuardrailAction::Allow)
    }
}
