//! TOML-driven guardrail configuration, mirroring `veritas_policy::rule`'s
//! "deserialize a declarative document, don't hardcode the list" convention.

use serde::{Deserialize, Serialize};
use veritas_contracts::error::VeritasError;

/// Tier 1 keyword lists and the tunable thresholds consulted by Tiers 2/3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Substrings that cause an immediate Block on input (case-insensitive).
    #[serde(default)]
    pub blocked_keywords: Vec<String>,

    /// Substrings that indicate a medical emergency and should Redirect
    /// rather than Block (§4.11).
    #[serde(default)]
    pub emergency_keywords: Vec<String>,

    /// Substrings forbidden from *output* regardless of input (e.g. "I
    /// diagnose you with").
    #[serde(default)]
    pub blocked_output_phrases: Vec<String>,

    /// Max input checks allowed per `rate_limit_window_secs` before Tier 2
    /// starts returning Warn (§4.11's sliding-window rate limiter).
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: i64,

    /// Tier 3's composite quality floor below which output is blocked
    /// (DESIGN.md Open Question: kept at 0.4, exposed here for tuning).
    #[serde(default = "default_quality_floor")]
    pub quality_floor: f64,
}

fn default_rate_limit_max() -> u32 {
    20
}

fn default_rate_limit_window_secs() -> i64 {
    60
}

fn default_quality_floor() -> f64 {
    0.4
}

impl GuardrailConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, VeritasError> {
        toml::from_str(toml_str).map_err(|e| VeritasError::ConfigError {
            reason: format!("failed to parse guardrail TOML: {e}"),
        })
    }

    /// A conservative built-in default, used when no config file is supplied.
    pub fn baseline() -> Self {
        Self {
            blocked_keywords: vec![
                "kill myself".to_string(),
                "suicide".to_string(),
                "overdose on purpose".to_string(),
            ],
            emergency_keywords: vec![
                "chest pain".to_string(),
                "can't breathe".to_string(),
                "cannot breathe".to_string(),
                "severe bleeding".to_string(),
                "unconscious".to_string(),
                // Vietnamese (§4.11/P8 — either supported language redirects).
                "đau ngực".to_string(),
                "khó thở".to_string(),
                "vã mồ hôi".to_string(),
                "bất tỉnh".to_string(),
            ],
            blocked_output_phrases: vec![
                "i diagnose you with".to_string(),
                "you definitely have".to_string(),
                "stop taking your medication".to_string(),
            ],
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            quality_floor: default_quality_floor(),
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self::baseline()
    }
}
