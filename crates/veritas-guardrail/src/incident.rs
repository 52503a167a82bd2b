//! Append-only, hash-chained incident log for Tier 3 guardrail events.
//!
//! Mirrors `veritas_audit::chain`'s hashing idiom (prev_hash linkage + SHA-256
//! over canonical JSON) but over `Incident` records instead of `StepRecord`s
//! — the audit crate's `hash_event` is typed to `StepRecord` specifically, so
//! this is a parallel chain for a different kind of event rather than a
//! literal reuse of that function.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The sentinel `prev_hash` for the first incident in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One recorded guardrail incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub sequence: u64,
    /// SHA-256 hex digest of the user/session id — never the raw id, so the
    /// exported log itself carries no directly identifying information.
    pub hashed_user_id: String,
    pub tier: String,
    pub action: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub this_hash: String,
}

fn hash_incident(sequence: u64, hashed_user_id: &str, tier: &str, action: &str, reason: &str, timestamp: &DateTime<Utc>, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(hashed_user_id.as_bytes());
    hasher.update(tier.as_bytes());
    hasher.update(action.as_bytes());
    hasher.update(reason.as_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a raw user id for storage — incidents never carry the plaintext id.
pub fn hash_user_id(user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// The append-only incident chain for one guardrail instance.
pub struct IncidentLog {
    incidents: Mutex<Vec<Incident>>,
}

impl IncidentLog {
    pub fn new() -> Self {
        Self { incidents: Mutex::new(Vec::new()) }
    }

    pub fn record(&self, user_id: &str, tier: &str, action: &str, reason: &str) {
        let mut incidents = self.incidents.lock().expect("incident log mutex poisoned");
        let sequence = incidents.len() as u64;
        let prev_hash = incidents.last().map(|i| i.this_hash.clone()).unwrap_or_else(|| GENESIS_HASH.to_string());
        let hashed_user_id = hash_user_id(user_id);
        let timestamp = Utc::now();
        let this_hash = hash_incident(sequence, &hashed_user_id, tier, action, reason, &timestamp, &prev_hash);

        incidents.push(Incident {
            sequence,
            hashed_user_id,
            tier: tier.to_string(),
            action: action.to_string(),
            reason: reason.to_string(),
            timestamp,
            prev_hash,
            this_hash,
        });
    }

    /// Verify the chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        let incidents = self.incidents.lock().expect("incident log mutex poisoned");
        let mut expected_prev = GENESIS_HASH.to_string();
        for incident in incidents.iter() {
            if incident.prev_hash != expected_prev {
                return false;
            }
            let recomputed = hash_incident(
                incident.sequence,
                &incident.hashed_user_id,
                &incident.tier,
                &incident.action,
                &incident.reason,
                &incident.timestamp,
                &incident.prev_hash,
            );
            if recomputed != incident.this_hash {
                return false;
            }
            expected_prev = incident.this_hash.clone();
        }
        true
    }

    /// A compliance-report projection: every incident in chain order. Export
    /// for the `evaluate`/reporting CLI surface (§A.8).
    pub fn export(&self) -> Vec<Incident> {
        self.incidents.lock().expect("incident log mutex poisoned").clone()
    }

    /// Aggregate incidents into a compliance summary (§6's
    /// `guardrail.report`). `window` restricts the count to incidents
    /// recorded in the last `window` relative to now; `None` reports the
    /// full chain. `by_kind` groups on `action` (block/warn/redirect),
    /// `by_severity` on `tier` — the two axes the log actually records.
    pub fn report(&self, window: Option<Duration>) -> GuardrailReport {
        let incidents = self.incidents.lock().expect("incident log mutex poisoned");
        let cutoff = window.map(|w| Utc::now() - w);

        let mut by_kind: HashMap<String, u64> = HashMap::new();
        let mut by_severity: HashMap<String, u64> = HashMap::new();
        let mut total_incidents = 0u64;

        for incident in incidents.iter().filter(|i| cutoff.map(|c| i.timestamp >= c).unwrap_or(true)) {
            total_incidents += 1;
            *by_kind.entry(incident.action.clone()).or_insert(0) += 1;
            *by_severity.entry(incident.tier.clone()).or_insert(0) += 1;
        }

        GuardrailReport { total_incidents, by_kind, by_severity }
    }
}

/// Aggregated view of the incident log returned by `report` (§6, §A.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailReport {
    pub total_incidents: u64,
    pub by_kind: HashMap<String, u64>,
    pub by_severity: HashMap<String, u64>,
}

impl Default for IncidentLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_incidents_form_a_valid_chain() {
        let log = IncidentLog::new();
        log.record("user-1", "tier3", "block", "pii detected");
        log.record("user-1", "tier3", "warn", "rate limit");
        assert!(log.verify_integrity());
        assert_eq!(log.export().len(), 2);
    }

    #[test]
    fn user_id_is_hashed_not_stored_raw() {
        let log = IncidentLog::new();
        log.record("patient-jane-doe", "tier3", "block", "pii detected");
        let exported = log.export();
        assert_ne!(exported[0].hashed_user_id, "patient-jane-doe");
        assert_eq!(exported[0].hashed_user_id, hash_user_id("patient-jane-doe"));
    }

    #[test]
    fn report_aggregates_by_kind_and_severity() {
        let log = IncidentLog::new();
        log.record("user-1", "tier1", "redirect", "emergency keyword");
        log.record("user-1", "tier3", "block", "pii detected");
        log.record("user-2", "tier3", "block", "adversarial prompt");

        let report = log.report(None);
        assert_eq!(report.total_incidents, 3);
        assert_eq!(report.by_kind.get("block"), Some(&2));
        assert_eq!(report.by_kind.get("redirect"), Some(&1));
        assert_eq!(report.by_severity.get("tier3"), Some(&2));
        assert_eq!(report.by_severity.get("tier1"), Some(&1));
    }

    #[test]
    fn report_window_excludes_older_incidents() {
        let log = IncidentLog::new();
        log.record("user-1", "tier3", "block", "pii detected");

        let recent = log.report(Some(Duration::minutes(1)));
        assert_eq!(recent.total_incidents, 1, "an incident recorded moments ago is within a one-minute window");

        let already_past = log.report(Some(Duration::seconds(-3600)));
        assert_eq!(already_past.total_incidents, 0, "a cutoff an hour in the future excludes every already-recorded incident");
    }

    #[test]
    fn tampering_breaks_the_chain() {
        let log = IncidentLog::new();
        log.record("user-1", "tier3", "block", "pii detected");
        log.record("user-1", "tier3", "warn", "rate limit");
        {
            let mut incidents = log.incidents.lock().unwrap();
            incidents[0].reason = "tampered".to_string();
        }
        assert!(!log.verify_integrity());
    }
}
