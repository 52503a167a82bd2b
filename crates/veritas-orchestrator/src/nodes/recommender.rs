//! §4.8: composes the patient-facing `final_response`. Never prescribes
//! medications or dosages; only hedged, general information.

use std::sync::Arc;

use serde_json::json;
use veritas_collaborators::LLMProvider;
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::TurnState,
    verify::{OutputSchema, VerificationRule, VerificationRuleType},
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

const SAFE_FALLBACK: &str = "I'm not able to give a complete answer right now. If your symptoms are severe or worsening, please seek in-person medical care.";

pub struct Recommender {
    provider: Arc<dyn LLMProvider>,
}

impl Recommender {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn schema() -> OutputSchema {
        support::schema_with_rules(
            "recommendation-v1",
            vec![
                VerificationRule {
                    rule_id: "req-response".to_string(),
                    description: "response text must be present".to_string(),
                    rule_type: VerificationRuleType::RequiredField { field_path: "response".to_string() },
                },
                VerificationRule {
                    rule_id: "no-dosage-instruction".to_string(),
                    description: "must not instruct a specific dosage".to_string(),
                    rule_type: VerificationRuleType::ForbiddenPattern { field_path: "response".to_string(), pattern: "mg every".to_string() },
                },
            ],
        )
    }
}

#[async_trait::async_trait]
impl Agent for Recommender {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let user_input = input.payload["user_input"].as_str().unwrap_or_default();
        let diagnosis = input.payload["diagnosis"].clone();
        let investigations = input.payload["investigations"].clone();
        let evidence = input.payload["evidence"].clone();

        let prompt = format!(
            "Compose a patient-facing response in the same language as the patient's message. Structure: \
             (a) acknowledge the complaint, (b) a hedged summary of the leading possibilities without stating \
             probabilities as fact, (c) recommended next questions or tests, (d) a short disclaimer to seek \
             professional care, (e) optional citations of evidence source ids. Never name a specific medication \
             dosage; general drug classes may be mentioned as information only. Respond as JSON: {{\"response\": str}}.\n\
             Patient message: {user_input}\nLeading hypotheses: {diagnosis}\nSuggested investigations: {investigations}\n\
             Evidence: {evidence}"
        );

        match self.provider.generate_structured(&prompt, &json!({"type": "object"})).await {
            Ok(payload) if payload.get("response").and_then(|v| v.as_str()).is_some() => {
                Ok(AgentOutput { kind: "recommendation".to_string(), payload })
            }
            _ => Ok(AgentOutput { kind: "recommendation".to_string(), payload: json!({ "response": SAFE_FALLBACK }) }),
        }
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("compose_recommendation".to_string(), "turn_state/final_response".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for Recommender {
    fn name(&self) -> &'static str {
        "Recommender"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let input = AgentInput {
            kind: "compose_recommendation".to_string(),
            payload: json!({
                "user_input": state.user_input,
                "diagnosis": state.diagnosis,
                "investigations": state.investigations,
                "evidence": state.evidence,
            }),
        };

        let response = match support::run_node_step(self.name(), self, input, Self::schema()).await {
            Ok(payload) => payload.get("response").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| SAFE_FALLBACK.to_string()),
            Err(_) => SAFE_FALLBACK.to_string(),
        };

        state.final_response = Some(response);
        Ok(state)
    }
}
