//! §4.6: short list of discriminating follow-up questions/tests, avoiding
//! duplication of facts the user already gave.

use std::sync::Arc;

use serde_json::json;
use veritas_collaborators::{structured_call, LLMProvider};
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::{Investigation, TurnState},
    verify::OutputSchema,
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

const MAX_INVESTIGATIONS: usize = 6;

pub struct InvestigationGenerator {
    provider: Arc<dyn LLMProvider>,
}

impl InvestigationGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn schema() -> OutputSchema {
        support::open_schema("investigations-v1")
    }
}

#[async_trait::async_trait]
impl Agent for InvestigationGenerator {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let diagnosis = input.payload["diagnosis"].clone();
        let known_symptoms = input.payload["symptoms"].clone();

        let prompt = format!(
            "Given these ranked diagnostic hypotheses, propose up to {MAX_INVESTIGATIONS} follow-up questions or tests, \
             each annotated with which hypotheses it helps discriminate between, as JSON: \
             {{\"investigations\": [{{\"prompt\": str, \"reason\": str, \"targets\": [str]}}]}}. \
             Do not ask about facts the patient already stated.\nHypotheses: {diagnosis}\nAlready known: {known_symptoms}"
        );

        let payload = structured_call(self.provider.as_ref(), &prompt, &Self::schema(), || json!({ "investigations": [] })).await?;
        Ok(AgentOutput { kind: "investigations".to_string(), payload })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("generate_investigations".to_string(), "turn_state/investigations".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for InvestigationGenerator {
    fn name(&self) -> &'static str {
        "InvestigationGenerator"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let input = AgentInput {
            kind: "generate_investigations".to_string(),
            payload: json!({ "diagnosis": state.diagnosis, "symptoms": state.symptoms }),
        };

        let payload = support::run_node_step(self.name(), self, input, Self::schema()).await?;
        let mut investigations: Vec<Investigation> =
            serde_json::from_value(payload.get("investigations").cloned().unwrap_or(json!([]))).unwrap_or_default();

        let known: Vec<String> = state.symptoms.iter().map(|s| s.name.to_lowercase()).collect();
        investigations.retain(|inv| !known.iter().any(|k| inv.prompt.to_lowercase().contains(k.as_str())));
        investigations.truncate(MAX_INVESTIGATIONS);

        state.investigations = investigations;
        Ok(state)
    }
}
