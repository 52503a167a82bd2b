//! §4.7: builds a retrieval query from the top hypotheses and salient
//! symptom terms, searches (k1 ≈ 20), reranks to k2 (default 5). Degrades to
//! empty evidence, never fails the turn, if the vector store is unavailable.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;
use veritas_collaborators::{Reranker, ScoredPassage, VectorIndex};
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    error::VeritasResult,
    turn::{EvidencePassage, TurnState},
    verify::OutputSchema,
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

const SEARCH_K: usize = 20;
const RERANK_K: usize = 5;

pub struct DocumentRetriever {
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
}

impl DocumentRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, reranker: Arc<dyn Reranker>) -> Self {
        Self { index, reranker }
    }

    fn schema() -> OutputSchema {
        support::open_schema("document-retrieval-v1")
    }

    fn build_query(state: &TurnState) -> String {
        let top_terms: Vec<String> = state.diagnosis.iter().take(3).map(|h| h.hypothesis.clone()).collect();
        let symptom_terms: Vec<String> = state.symptoms.iter().map(|s| s.name.clone()).collect();
        [top_terms, symptom_terms].concat().join(" ")
    }
}

#[async_trait::async_trait]
impl Agent for DocumentRetriever {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let query = input.payload["query"].as_str().unwrap_or_default();

        let candidates = match self.index.search(query, SEARCH_K).await {
            Ok(c) => c,
            Err(e) => {
                warn!(%e, "vector store unavailable, degrading to empty evidence");
                Vec::new()
            }
        };

        let reranked: Vec<ScoredPassage> = if candidates.is_empty() {
            Vec::new()
        } else {
            self.reranker.rerank(query, candidates, RERANK_K).await.unwrap_or_default()
        };

        Ok(AgentOutput { kind: "evidence".to_string(), payload: json!({ "evidence": reranked }) })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("retrieve_evidence".to_string(), "turn_state/evidence".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for DocumentRetriever {
    fn name(&self) -> &'static str {
        "DocumentRetriever"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        let query = Self::build_query(&state);
        let input = AgentInput { kind: "retrieve_evidence".to_string(), payload: json!({ "query": query }) };

        let payload = support::run_node_step(self.name(), self, input, Self::schema()).await?;
        let scored: Vec<ScoredPassage> = serde_json::from_value(payload.get("evidence").cloned().unwrap_or(json!([])))
            .unwrap_or_default();

        state.evidence = scored
            .into_iter()
            .map(|p| EvidencePassage { passage: p.passage, source_id: p.source_id, relevance: p.score })
            .collect();
        Ok(state)
    }
}
