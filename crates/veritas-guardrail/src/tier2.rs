//! Tier 2: wraps Tier 1, adds a sliding-window rate limiter per session.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use veritas_contracts::{error::VeritasResult, risk::UserRiskProfile, turn::GuardrailAction};

use crate::{config::GuardrailConfig, tier1::SimpleGuardrail, Guardrail};

/// Adds a sliding-window request-rate check on top of `SimpleGuardrail`. A
/// session that exceeds `rate_limit_max` calls within
/// `rate_limit_window_secs` gets `Warn` on input even when Tier 1 would have
/// allowed it outright — escalation never relaxation.
///
/// One guardrail chain is built per session (§5: the core is built once, but
/// per-session state like this lives alongside the session's `TurnState`),
/// so the rate window here tracks a single session's call history rather
/// than taking a session id as a parameter.
pub struct IntermediateGuardrail {
    inner: SimpleGuardrail,
    window: Duration,
    max_calls: u32,
    calls: Mutex<Vec<DateTime<Utc>>>,
}

impl IntermediateGuardrail {
    pub fn new(config: GuardrailConfig) -> Self {
        let window = Duration::seconds(config.rate_limit_window_secs);
        let max_calls = config.rate_limit_max;
        Self {
            inner: SimpleGuardrail::new(config),
            window,
            max_calls,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Record a call and report whether the session is now over its rate
    /// limit, pruning timestamps outside the window as it goes.
    fn record_and_check(&self, now: DateTime<Utc>) -> bool {
        let mut calls = self.calls.lock().expect("rate limiter mutex poisoned");
        calls.retain(|t| now - *t <= self.window);
        calls.push(now);
        calls.len() as u32 > self.max_calls
    }
}

#[async_trait::async_trait]
impl Guardrail for IntermediateGuardrail {
    async fn check_input(&self, text: &str, risk: &mut UserRiskProfile) -> VeritasResult<GuardrailAction> {
        let base = self.inner.check_input(text, risk).await?;
        if base != GuardrailAction::Allow {
            return Ok(base);
        }

        if self.record_and_check(Utc::now()) {
            tracing::warn!("tier 2 rate limit exceeded");
            return Ok(GuardrailAction::Warn);
        }
        Ok(GuardrailAction::Allow)
    }

    async fn check_output(&self, text: &str) -> VeritasResult<GuardrailAction> {
        self.inner.check_output(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_limit(max: u32) -> GuardrailConfig {
        let mut config = GuardrailConfig::baseline();
        config.rate_limit_max = max;
        config.rate_limit_window_secs = 60;
        config
    }

    #[tokio::test]
    async fn allows_calls_under_the_limit() {
        let guardrail = IntermediateGuardrail::new(config_with_limit(5));
        let mut risk = UserRiskProfile::new();
        for _ in 0..5 {
            let action = guardrail.check_input("a mild headache", &mut risk).await.unwrap();
            assert_eq!(action, GuardrailAction::Allow);
        }
    }

    #[tokio::test]
    async fn warns_once_over_the_limit() {
        let guardrail = IntermediateGuardrail::new(config_with_limit(2));
        let mut risk = UserRiskProfile::new();
        guardrail.check_input("a mild headache", &mut risk).await.unwrap();
        guardrail.check_input("a mild headache", &mut risk).await.unwrap();
        let third = guardrail.check_input("a mild headache", &mut risk).await.unwrap();
        assert_eq!(third, GuardrailAction::Warn);
    }

    #[tokio::test]
    async fn tier1_block_is_not_overridden_by_rate_check() {
        let guardrail = IntermediateGuardrail::new(config_with_limit(100));
        let mut risk = UserRiskProfile::new();
        let action = guardrail.check_input("I want to kill myself", &mut risk).await.unwrap();
        assert_eq!(action, GuardrailAction::Block);
    }
}
