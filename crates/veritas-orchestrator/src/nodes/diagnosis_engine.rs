//! §4.5: ranks diagnostic hypotheses from structured symptoms, flags
//! emergency patterns, and enforces the probability/count invariants the
//! Supervisor and Recommender both rely on.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use veritas_collaborators::{structured_call, LLMProvider};
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::{DiagnosisHypothesis, Intent, TurnState},
    verify::OutputSchema,
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

const MAX_HYPOTHESES: usize = 5;

/// Curated emergency patterns (§4.5's "acute chest pain with radiating
/// features, stroke signs, anaphylaxis" examples).
const EMERGENCY_PATTERNS: &[&str] = &[
    "acute coronary",
    "myocardial infarction",
    "stroke",
    "anaphylaxis",
    "pulmonary embolism",
    "aortic dissection",
    "sepsis",
];

#[derive(Deserialize)]
struct RawHypothesis {
    hypothesis: String,
    rationale: String,
    probability: f64,
}

pub struct DiagnosisEngine {
    provider: Arc<dyn LLMProvider>,
}

impl DiagnosisEngine {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn schema() -> OutputSchema {
        support::open_schema("diagnosis-v1")
    }

    fn is_red_flag(hypothesis: &str) -> bool {
        let lower = hypothesis.to_lowercase();
        EMERGENCY_PATTERNS.iter().any(|p| lower.contains(p))
    }

    /// Truncate to `MAX_HYPOTHESES`, then scale probabilities down (never up)
    /// so they sum to at most 1.0 — the residual is the implicit
    /// "other/insufficient" mass (§4.5).
    fn normalize(mut raw: Vec<RawHypothesis>) -> Vec<DiagnosisHypothesis> {
        raw.truncate(MAX_HYPOTHESES);
        let total: f64 = raw.iter().map(|h| h.probability.max(0.0)).sum();
        let scale = if total > 1.0 { 1.0 / total } else { 1.0 };

        let mut out: Vec<DiagnosisHypothesis> = raw
            .into_iter()
            .map(|h| DiagnosisHypothesis {
                red_flag: Self::is_red_flag(&h.hypothesis),
                hypothesis: h.hypothesis,
                rationale: h.rationale,
                probability: (h.probability.max(0.0) * scale).min(1.0),
            })
            .collect();
        out.sort_by(|a, b| b.probability.partial_cmp(&a.probability).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.hypothesis.cmp(&b.hypothesis)));
        out
    }
}

#[async_trait::async_trait]
impl Agent for DiagnosisEngine {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let symptoms = input.payload["symptoms"].clone();
        let image_description = input.payload["image_description"].as_str().unwrap_or_default();

        let prompt = format!(
            "Given these structured symptoms and optional image findings, propose up to {MAX_HYPOTHESES} ranked diagnostic \
             hypotheses as JSON: {{\"hypotheses\": [{{\"hypothesis\": str, \"rationale\": str, \"probability\": number}}]}}, \
             probabilities summing to at most 1.0.\nSymptoms: {symptoms}\nImage findings: {image_description}"
        );

        let payload = structured_call(self.provider.as_ref(), &prompt, &Self::schema(), || json!({ "hypotheses": [] })).await?;
        Ok(AgentOutput { kind: "diagnosis".to_string(), payload })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("rank_diagnosis".to_string(), "turn_state/diagnosis".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for DiagnosisEngine {
    fn name(&self) -> &'static str {
        "DiagnosisEngine"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let image_description = state.image_analysis.as_ref().map(|a| a.description.as_str()).unwrap_or_default();
        let input = AgentInput {
            kind: "rank_diagnosis".to_string(),
            payload: json!({ "symptoms": state.symptoms, "image_description": image_description }),
        };

        let payload = support::run_node_step(self.name(), self, input, Self::schema()).await?;
        let raw: Vec<RawHypothesis> = serde_json::from_value(payload.get("hypotheses").cloned().unwrap_or(json!([])))
            .unwrap_or_default();
        let diagnosis = Self::normalize(raw);

        if diagnosis.iter().any(|h| h.red_flag) {
            state.intent = Some(Intent::Emergency);
        }
        state.diagnosis = diagnosis;
        Ok(state)
    }
}
