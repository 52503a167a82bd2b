//! §4.4: parses free text (bilingual-tolerant) into the structured symptom
//! list. An empty result is a valid outcome, not a failure.

use std::sync::Arc;

use serde_json::json;
use veritas_collaborators::{structured_call, LLMProvider};
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::{Symptom, TurnState},
    verify::OutputSchema,
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

pub struct SymptomExtractor {
    provider: Arc<dyn LLMProvider>,
}

impl SymptomExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn schema() -> OutputSchema {
        support::open_schema("symptom-extraction-v1")
    }
}

#[async_trait::async_trait]
impl Agent for SymptomExtractor {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let user_input = input.payload["user_input"].as_str().unwrap_or_default();
        let image_description = input.payload["image_description"].as_str().unwrap_or_default();

        let prompt = format!(
            "Extract structured symptoms (any language) from this patient text and image description. \
             Respond as JSON: {{\"symptoms\": [{{\"name\": str, \"duration\": str|null, \"severity\": \"mild\"|\"moderate\"|\"severe\"|null, \"site\": str|null, \"modifiers\": [str]}}]}}. \
             If no symptom is stated, return an empty list.\nPatient text: {user_input}\nImage description: {image_description}"
        );

        let payload = structured_call(self.provider.as_ref(), &prompt, &Self::schema(), || json!({ "symptoms": [] })).await?;
        Ok(AgentOutput { kind: "symptoms".to_string(), payload })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("extract_symptoms".to_string(), "turn_state/symptoms".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for SymptomExtractor {
    fn name(&self) -> &'static str {
        "SymptomExtractor"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let image_description = state.image_analysis.as_ref().map(|a| a.description.as_str()).unwrap_or_default();
        let input = AgentInput {
            kind: "extract_symptoms".to_string(),
            payload: json!({ "user_input": state.user_input, "image_description": image_description }),
        };

        let payload = support::run_node_step(self.name(), self, input, Self::schema()).await?;
        let symptoms: Vec<Symptom> = serde_json::from_value(payload.get("symptoms").cloned().unwrap_or(json!([])))
            .unwrap_or_default();
        state.symptoms = symptoms;
        Ok(state)
    }
}
