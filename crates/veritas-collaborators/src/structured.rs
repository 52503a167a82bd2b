//! The generic "ask for JSON, get JSON" helper every LLM-backed turn node
//! builds on (§9's design note: "prompt → raw text → schema extractor →
//! validator → retry → heuristic fallback").
//!
//! Built once here rather than reimplemented per node, atop
//! `veritas_verify::engine::SchemaVerifier` and the same `OutputSchema`/
//! `AgentOutput` contract types the executor pipeline already uses — so a
//! turn node's structured call is verified with the exact same machinery its
//! step is verified with.

use regex::Regex;
use serde_json::Value;

use veritas_contracts::{agent::AgentOutput, error::VeritasError, error::VeritasResult, verify::OutputSchema};
use veritas_core::traits::Verifier;
use veritas_verify::engine::SchemaVerifier;

use crate::llm::LLMProvider;

/// How many times `structured_call` will re-prompt the provider after a
/// validation failure before giving up and returning the error.
const MAX_RETRIES: u32 = 2;

/// Strip a ```json ... ``` (or bare ```) fence the model may have wrapped
/// its answer in. Providers without a native JSON mode routinely do this.
fn strip_code_fence(raw: &str) -> &str {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex is valid");
    match fence.captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

/// Extract the first top-level JSON object or array found in `raw`, after
/// fence-stripping. Falls back to parsing the whole trimmed string.
fn extract_json(raw: &str) -> Option<Value> {
    let stripped = strip_code_fence(raw);
    if let Ok(v) = serde_json::from_str::<Value>(stripped) {
        return Some(v);
    }
    let start = stripped.find(['{', '['])?;
    let end = stripped.rfind(['}', ']'])?;
    if end < start {
        return None;
    }
    serde_json::from_str::<Value>(&stripped[start..=end]).ok()
}

/// Ask `provider` to produce a payload matching `schema`, validating the
/// result with a `SchemaVerifier` and retrying on failure by re-prompting
/// with the accumulated error messages appended. After `MAX_RETRIES` failed
/// attempts, returns `fallback()` — a caller-supplied, always-valid default —
/// rather than propagating the error, so a single flaky generation never
/// aborts a turn outright.
pub async fn structured_call<F>(
    provider: &dyn LLMProvider,
    prompt: &str,
    schema: &OutputSchema,
    fallback: F,
) -> VeritasResult<Value>
where
    F: FnOnce() -> Value,
{
    let verifier = SchemaVerifier::new();
    let mut attempt_prompt = prompt.to_string();

    for attempt in 0..=MAX_RETRIES {
        let raw = provider.generate_structured(&attempt_prompt, &schema.json_schema).await?;
        let candidate = match &raw {
            Value::String(s) => extract_json(s),
            other => Some(other.clone()),
        };

        let Some(payload) = candidate else {
            attempt_prompt = format!(
                "{prompt}\n\nYour previous reply could not be parsed as JSON. Reply with JSON only."
            );
            continue;
        };

        let output = AgentOutput { kind: "structured".to_string(), payload: payload.clone() };
        let report = verifier.verify(&output, schema)?;
        if report.passed {
            return Ok(payload);
        }

        if attempt == MAX_RETRIES {
            tracing::warn!(
                attempts = attempt + 1,
                failures = ?report.failures,
                "structured_call exhausted retries, using fallback"
            );
            return Ok(fallback());
        }

        let failure_summary = report
            .failures
            .iter()
            .map(|f| format!("- {}: {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("\n");
        attempt_prompt = format!(
            "{prompt}\n\nYour previous reply failed validation:\n{failure_summary}\nReply again with JSON that fixes these issues."
        );
    }

    Err(VeritasError::SchemaValidation { reason: "structured_call: unreachable retry exhaustion".to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use veritas_contracts::verify::{VerificationRule, VerificationRuleType};

    struct FencedProvider;

    #[async_trait::async_trait]
    impl LLMProvider for FencedProvider {
        async fn generate(&self, _prompt: &str) -> VeritasResult<String> {
            Ok(String::new())
        }

        async fn generate_structured(&self, _prompt: &str, _schema: &Value) -> VeritasResult<Value> {
            Ok(Value::String("```json\n{\"status\": \"ok\"}\n```".to_string()))
        }

        async fn generate_multimodal(
            &self,
            _prompt: &str,
            _image: &veritas_contracts::turn::ImageRef,
            _schema: Option<&Value>,
        ) -> VeritasResult<Value> {
            unimplemented!()
        }
    }

    struct AlwaysInvalidProvider;

    #[async_trait::async_trait]
    impl LLMProvider for AlwaysInvalidProvider {
        async fn generate(&self, _prompt: &str) -> VeritasResult<String> {
            Ok(String::new())
        }

        async fn generate_structured(&self, _prompt: &str, _schema: &Value) -> VeritasResult<Value> {
            Ok(json!({ "wrong_field": true }))
        }

        async fn generate_multimodal(
            &self,
            _prompt: &str,
            _image: &veritas_contracts::turn::ImageRef,
            _schema: Option<&Value>,
        ) -> VeritasResult<Value> {
            unimplemented!()
        }
    }

    fn status_schema() -> OutputSchema {
        OutputSchema {
            schema_id: "status-v1".to_string(),
            json_schema: Value::Null,
            rules: vec![VerificationRule {
                rule_id: "req-status".to_string(),
                description: "status must be present".to_string(),
                rule_type: VerificationRuleType::RequiredField { field_path: "status".to_string() },
            }],
        }
    }

    #[tokio::test]
    async fn extracts_json_from_fenced_reply() {
        let provider = FencedProvider;
        let schema = status_schema();
        let result = structured_call(&provider, "prompt", &schema, || json!({})).await.unwrap();
        assert_eq!(result["status"], "ok");
    }

    #[tokio::test]
    async fn falls_back_after_exhausting_retries() {
        let provider = AlwaysInvalidProvider;
        let schema = status_schema();
        let result = structured_call(&provider, "prompt", &schema, || json!({ "status": "fallback" }))
            .await
            .unwrap();
        assert_eq!(result["status"], "fallback");
    }
}
