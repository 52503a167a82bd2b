//! LLM provider contract (§6).
//!
//! Real implementations back `generate`/`generate_structured` with an actual
//! model call. The structured-output path is adapted on top of this trait by
//! `structured::structured_call`, per §9's "prompt → raw text → schema
//! extractor → validator → retry → heuristic fallback" design note — the
//! trait itself stays small, with structure added only where it is used.

use serde_json::Value;

use veritas_contracts::{error::VeritasResult, turn::ImageRef};

/// The model-backed text/structured-generation collaborator.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Free-text generation. No structural guarantee on the result.
    async fn generate(&self, prompt: &str) -> VeritasResult<String>;

    /// Ask for a structured-output mode response, if the provider supports
    /// one natively. Implementations that lack native JSON mode may still
    /// return arbitrary text here — `structured_call` treats this as "raw
    /// text" and applies its own extraction/validation/retry on top.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> VeritasResult<Value>;

    /// A joint description + focused-Q&A call over an image and the user's
    /// symptom text, in a single request (§4.3 — batched, never per-question).
    async fn generate_multimodal(
        &self,
        prompt: &str,
        image: &ImageRef,
        schema: Option<&Value>,
    ) -> VeritasResult<Value>;
}

/// A deterministic, fixed-response mock provider for local development and
/// tests — no network calls, no randomness. Canned responses are looked up
/// by a caller-supplied "kind" tag embedded as the prompt's first line
/// (`"kind: <tag>\n..."`).
pub struct MockLLMProvider;

impl MockLLMProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LLMProvider for MockLLMProvider {
    async fn generate(&self, prompt: &str) -> VeritasResult<String> {
        Ok(format!("[mock completion for: {}]", prompt.chars().take(60).collect::<String>()))
    }

    async fn generate_structured(&self, prompt: &str, _schema: &Value) -> VeritasResult<Value> {
        Ok(serde_json::json!({ "raw_prompt_echo": prompt }))
    }

    async fn generate_multimodal(
        &self,
        _prompt: &str,
        image: &ImageRef,
        _schema: Option<&Value>,
    ) -> VeritasResult<Value> {
        Ok(serde_json::json!({
            "description": format!("mock visual description of {}", image.mime_type),
            "visual_qa": [],
            "confidence": 0.5
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_generate_is_deterministic() {
        let provider = MockLLMProvider::new();
        let a = provider.generate("hello").await.unwrap();
        let b = provider.generate("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_multimodal_returns_bounded_confidence() {
        let provider = MockLLMProvider::new();
        let image = ImageRef { blob_ref: "ref-1".to_string(), mime_type: "image/jpeg".to_string() };
        let result = provider.generate_multimodal("describe", &image, None).await.unwrap();
        let confidence = result["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }
}
