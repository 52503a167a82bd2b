//! §4.3: joint description + focused-Q&A over an uploaded image in a single
//! batched model call.

use std::sync::Arc;

use serde_json::json;
use veritas_collaborators::LLMProvider;
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::{ImageAnalysis, TurnState},
    verify::{OutputSchema, VerificationRule, VerificationRuleType},
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

pub struct ImageAnalyzer {
    provider: Arc<dyn LLMProvider>,
}

impl ImageAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn schema(strict: bool) -> OutputSchema {
        let mut rules = vec![VerificationRule {
            rule_id: "req-description".to_string(),
            description: "description must be present".to_string(),
            rule_type: VerificationRuleType::RequiredField { field_path: "description".to_string() },
        }];
        if strict {
            rules.push(VerificationRule {
                rule_id: "req-confidence".to_string(),
                description: "confidence must be present on retry".to_string(),
                rule_type: VerificationRuleType::RequiredField { field_path: "confidence".to_string() },
            });
        }
        support::schema_with_rules("image-analysis-v1", rules)
    }
}

#[async_trait::async_trait]
impl Agent for ImageAnalyzer {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let image_ref: veritas_contracts::turn::ImageRef =
            serde_json::from_value(input.payload["image"].clone()).map_err(|e| {
                veritas_contracts::error::VeritasError::ValidationError { reason: format!("missing image: {e}") }
            })?;
        let user_input = input.payload["user_input"].as_str().unwrap_or_default();
        let strict = input.payload["strict"].as_bool().unwrap_or(false);

        let prompt = if strict {
            format!(
                "Analyze this clinical image alongside the patient's description and respond ONLY with strict JSON matching {{description, visual_qa: [[question, answer]], confidence}}. Patient text: {user_input}"
            )
        } else {
            format!(
                "Analyze this clinical image alongside the patient's description: describe what is visible, answer focused follow-up questions about it, and rate your confidence. Patient text: {user_input}"
            )
        };

        let payload = self.provider.generate_multimodal(&prompt, &image_ref, None).await?;
        Ok(AgentOutput { kind: "image_analysis".to_string(), payload })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("analyze_image".to_string(), "turn_state/image".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for ImageAnalyzer {
    fn name(&self) -> &'static str {
        "ImageAnalyzer"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let Some(image) = state.image.clone() else {
            return Ok(state);
        };

        let input = AgentInput {
            kind: "analyze_image".to_string(),
            payload: json!({ "image": image, "user_input": state.user_input, "strict": false }),
        };

        let first = support::run_node_step(self.name(), self, input, Self::schema(false)).await;
        let result = match first {
            Ok(payload) => Ok(payload),
            Err(_) => {
                let image = state.image.clone().expect("checked above");
                let retry_input = AgentInput {
                    kind: "analyze_image".to_string(),
                    payload: json!({ "image": image, "user_input": state.user_input, "strict": true }),
                };
                support::run_node_step(self.name(), self, retry_input, Self::schema(true)).await
            }
        };

        match result.and_then(|payload| serde_json::from_value::<ImageAnalysis>(payload).map_err(|e| {
            veritas_contracts::error::VeritasError::SchemaValidation { reason: e.to_string() }
        })) {
            Ok(analysis) => state.image_analysis = Some(analysis),
            Err(e) => {
                state.image_analysis = None;
                state.record_message(self.name(), "image".to_string(), "null".to_string(), Some(format!("image analysis failed twice: {e}")));
            }
        }

        Ok(state)
    }
}
