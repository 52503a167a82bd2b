//! User risk profile, consulted by the Advanced (Tier 3) guardrail only (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded warning against a session or user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
}

/// Aggregate safety-relevant signal for a session or hashed user id.
///
/// `recent_warnings` is windowed by time (§5, default 24h); counters use
/// last-writer-wins semantics under concurrent update, the warning list is
/// append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRiskProfile {
    pub violation_count: u32,
    pub blocked_count: u32,
    pub recent_warnings: Vec<Warning>,
    pub suspicious_patterns: Vec<String>,
    pub risk_score: f64,
}

impl UserRiskProfile {
    pub fn new() -> Self {
        Self {
            violation_count: 0,
            blocked_count: 0,
            recent_warnings: Vec::new(),
            suspicious_patterns: Vec::new(),
            risk_score: 0.0,
        }
    }

    /// Drop warnings older than `window`, then recompute `risk_score` as a
    /// saturating function of recent violations. Kept deliberately simple —
    /// Tier 3's composite quality threshold is calibrated separately
    /// (DESIGN.md Open Questions).
    pub fn decay_and_rescore(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        self.recent_warnings.retain(|w| now - w.timestamp <= window);
        let recent = self.recent_warnings.len() as f64;
        self.risk_score = (recent / 10.0).min(1.0);
    }

    pub fn record_violation(&mut self, kind: impl Into<String>, now: DateTime<Utc>) {
        self.violation_count += 1;
        self.recent_warnings.push(Warning { timestamp: now, kind: kind.into() });
    }

    pub fn record_block(&mut self) {
        self.blocked_count += 1;
    }
}

impl Default for UserRiskProfile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn decay_drops_old_warnings_and_rescales() {
        let mut profile = UserRiskProfile::new();
        let now = Utc::now();
        profile.record_violation("pii-hint", now - Duration::hours(30));
        profile.record_violation("profanity", now);

        profile.decay_and_rescore(now, Duration::hours(24));

        assert_eq!(profile.recent_warnings.len(), 1);
        assert_eq!(profile.violation_count, 2, "violation_count is cumulative, not windowed");
        assert!(profile.risk_score > 0.0);
    }

    #[test]
    fn record_block_increments_blocked_count() {
        let mut profile = UserRiskProfile::new();
        profile.record_block();
        profile.record_block();
        assert_eq!(profile.blocked_count, 2);
    }
}
