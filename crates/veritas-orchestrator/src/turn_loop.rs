//! §4.2: the cooperative per-turn loop. Owns the agent registry (built once,
//! §5) and the selected guardrail tier, and is the sole place that adapts
//! between `veritas_guardrail::Guardrail`'s `(text, risk) -> GuardrailAction`
//! contract and §4.11's `check_input(state) -> state` / `check_output(state)
//! -> state` contract — see DESIGN.md's Orchestration entry for why the
//! adaptation lives here rather than changing either trait.

use std::collections::HashMap;
use std::sync::Arc;

use veritas_contracts::{
    error::VeritasResult,
    risk::UserRiskProfile,
    turn::{GuardrailAction, HistoryEntry, ImageRef, Role, TurnState},
};
use veritas_guardrail::{Guardrail, GuardrailManager};

use crate::{supervisor, turn_node::TurnNode};

/// Fixed bound on Supervisor iterations within one turn (§4.2).
const MAX_STEPS: u32 = 12;

/// How many of the most recent history entries are kept when persisting
/// (§5's example truncation value; DESIGN.md Open Questions).
const HISTORY_TRUNCATION_K: usize = 20;

const EMERGENCY_REDIRECT_MESSAGE: &str = "This may be a medical emergency. Please call your local emergency number or go to the nearest emergency department right now.";
const INPUT_BLOCKED_MESSAGE: &str = "I can't help with that request. If you have a medical question, please rephrase it.";
const OUTPUT_BLOCKED_MESSAGE: &str = "I'm not able to share that response. If your symptoms are severe or worsening, please seek in-person medical care.";
const FAIL_SAFE_MESSAGE: &str = "I wasn't able to complete this request. Please try again, or contact the clinic directly if this is urgent.";

/// The result of running one full turn: the final state plus the risk
/// profile and history the caller should persist alongside the session.
pub struct TurnOutcome {
    pub state: TurnState,
    pub risk: UserRiskProfile,
    pub history: Vec<HistoryEntry>,
}

pub struct TurnLoop {
    nodes: HashMap<&'static str, Arc<dyn TurnNode>>,
    guardrail: Arc<GuardrailManager>,
}

impl TurnLoop {
    pub fn new(nodes: Vec<Arc<dyn TurnNode>>, guardrail: Arc<GuardrailManager>) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.name(), n)).collect();
        Self { nodes, guardrail }
    }

    fn node(&self, name: &str) -> Option<Arc<dyn TurnNode>> {
        self.nodes.get(name).cloned()
    }

    /// The selected tier's incident log, if it keeps one (§6's
    /// `guardrail.report`; only Tier 3 records incidents).
    pub fn incident_log(&self) -> Option<&veritas_guardrail::IncidentLog> {
        self.guardrail.incident_log()
    }

    /// Apply a `GuardrailAction` produced against the turn's input text,
    /// mutating `state` per §4.11's shared policy.
    fn apply_input_action(state: &mut TurnState, action: GuardrailAction) {
        state.guardrail_action = Some(action);
        match action {
            GuardrailAction::Allow => {}
            GuardrailAction::Warn => {}
            GuardrailAction::Redirect => {
                state.intent = Some(veritas_contracts::turn::Intent::Emergency);
                state.final_response = Some(EMERGENCY_REDIRECT_MESSAGE.to_string());
            }
            GuardrailAction::Block => {
                state.final_response = Some(INPUT_BLOCKED_MESSAGE.to_string());
            }
        }
    }

    /// Apply a `GuardrailAction` produced against the composed response.
    /// Never re-enables a turn already terminated by `check_input`.
    fn apply_output_action(state: &mut TurnState, action: GuardrailAction) {
        match action {
            GuardrailAction::Allow => {}
            GuardrailAction::Warn => {
                state.guardrail_action = Some(GuardrailAction::Warn);
            }
            GuardrailAction::Redirect => {
                state.guardrail_action = Some(GuardrailAction::Redirect);
                state.final_response = Some(EMERGENCY_REDIRECT_MESSAGE.to_string());
            }
            GuardrailAction::Block => {
                state.guardrail_action = Some(GuardrailAction::Block);
                state.final_response = Some(OUTPUT_BLOCKED_MESSAGE.to_string());
            }
        }
    }

    /// Run one full turn per §4.2's pseudocode. `risk` is the caller's
    /// current `UserRiskProfile` for this session; the returned profile
    /// reflects whatever Tier 3 recorded during this turn.
    pub async fn run_turn(
        &self,
        session_id: &str,
        user_input: &str,
        image: Option<ImageRef>,
        history: Vec<HistoryEntry>,
        appointment_draft: Option<veritas_contracts::turn::AppointmentDraft>,
        mut risk: UserRiskProfile,
    ) -> VeritasResult<TurnOutcome> {
        let mut state = TurnState::new(session_id, user_input, image, history.clone());
        state.appointment_draft = appointment_draft;

        let input_action = self.guardrail.check_input(user_input, &mut risk).await?;
        Self::apply_input_action(&mut state, input_action);

        let input_terminated = matches!(input_action, GuardrailAction::Redirect | GuardrailAction::Block);

        if !input_terminated {
            let mut steps = 0u32;
            loop {
                if state.is_terminal() {
                    break;
                }
                let decision = supervisor::decide(&mut state);
                tracing::debug!(next_agent = decision.next_agent.name(), reasoning = %decision.reasoning, "supervisor decision");
                if decision.next_agent == supervisor::NextAgent::Terminate {
                    break;
                }
                steps += 1;
                if steps > MAX_STEPS {
                    break;
                }
                let node = self.node(decision.next_agent.name()).ok_or_else(|| veritas_contracts::error::VeritasError::StateMachineError {
                    reason: format!("no node registered for {}", decision.next_agent.name()),
                })?;
                state = node.run(state).await?;
                supervisor::mark_done(&mut state, decision.next_agent.name());
            }

            if !state.is_terminal() {
                if state.intent == Some(veritas_contracts::turn::Intent::Emergency) {
                    // DiagnosisEngine can raise Emergency mid-loop on a red-flag
                    // hypothesis (§4.5); the Supervisor terminates immediately but
                    // leaves the redirect text to us, same as the input-keyword path.
                    state.guardrail_action = Some(GuardrailAction::Redirect);
                    state.final_response = Some(EMERGENCY_REDIRECT_MESSAGE.to_string());
                } else {
                    state = match self.node("Recommender") {
                        Some(recommender) => recommender.run(state).await.unwrap_or_else(|_| {
                            let mut fallback_state = TurnState::new(session_id, user_input, None, history.clone());
                            fallback_state.final_response = Some(FAIL_SAFE_MESSAGE.to_string());
                            fallback_state
                        }),
                        None => state,
                    };
                    if !state.is_terminal() {
                        state.final_response = Some(FAIL_SAFE_MESSAGE.to_string());
                    }
                }
            }
        }

        if !input_terminated {
            let text = state.final_response.clone().unwrap_or_default();
            let output_action = self.guardrail.check_output(&text).await?;
            Self::apply_output_action(&mut state, output_action);
        }

        let mut new_history = history;
        new_history.push(HistoryEntry { role: Role::User, text: user_input.to_string() });
        new_history.push(HistoryEntry { role: Role::Assistant, text: state.final_response.clone().unwrap_or_default() });
        if new_history.len() > HISTORY_TRUNCATION_K {
            let drop = new_history.len() - HISTORY_TRUNCATION_K;
            new_history.drain(0..drop);
        }

        Ok(TurnOutcome { state, risk, history: new_history })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use veritas_contracts::error::VeritasResult as Result;
    use veritas_guardrail::{GuardrailConfig, GuardrailManager, GuardrailTier};

    struct StubRecommender;

    #[async_trait]
    impl TurnNode for StubRecommender {
        fn name(&self) -> &'static str {
            "Recommender"
        }
        async fn run(&self, mut state: TurnState) -> Result<TurnState> {
            state.final_response = Some("stub recommendation".to_string());
            Ok(state)
        }
    }

    struct StubConversationAgent;

    #[async_trait]
    impl TurnNode for StubConversationAgent {
        fn name(&self) -> &'static str {
            "ConversationAgent"
        }
        async fn run(&self, mut state: TurnState) -> Result<TurnState> {
            state.final_response = Some("We're open 8-6.".to_string());
            Ok(state)
        }
    }

    fn guardrail() -> Arc<GuardrailManager> {
        Arc::new(GuardrailManager::new(GuardrailTier::Simple, GuardrailConfig::baseline()))
    }

    #[tokio::test]
    async fn faq_turn_terminates_with_a_response() {
        let turn_loop = TurnLoop::new(vec![Arc::new(StubConversationAgent), Arc::new(StubRecommender)], guardrail());
        let outcome = turn_loop.run_turn("sess-1", "what are your hours", None, vec![], None, UserRiskProfile::new()).await.unwrap();
        assert_eq!(outcome.state.final_response.as_deref(), Some("We're open 8-6."));
        assert_eq!(outcome.history.len(), 2);
    }

    #[tokio::test]
    async fn emergency_keyword_short_circuits_before_any_node_runs() {
        let turn_loop = TurnLoop::new(vec![Arc::new(StubConversationAgent), Arc::new(StubRecommender)], guardrail());
        let outcome = turn_loop.run_turn("sess-1", "I think I am having a heart attack, chest pain", None, vec![], None, UserRiskProfile::new()).await.unwrap();
        assert_eq!(outcome.state.guardrail_action, Some(GuardrailAction::Redirect));
        assert!(outcome.state.final_response.unwrap().contains("emergency"));
    }

    struct StubDiagnosisEngine;

    #[async_trait]
    impl TurnNode for StubDiagnosisEngine {
        fn name(&self) -> &'static str {
            "DiagnosisEngine"
        }
        async fn run(&self, mut state: TurnState) -> Result<TurnState> {
            state.diagnosis.push(veritas_contracts::turn::DiagnosisHypothesis {
                hypothesis: "Acute coronary syndrome".to_string(),
                rationale: "red flag pattern".to_string(),
                probability: 0.9,
                red_flag: true,
            });
            state.intent = Some(veritas_contracts::turn::Intent::Emergency);
            Ok(state)
        }
    }

    struct StubSymptomExtractor;

    #[async_trait]
    impl TurnNode for StubSymptomExtractor {
        fn name(&self) -> &'static str {
            "SymptomExtractor"
        }
        async fn run(&self, mut state: TurnState) -> Result<TurnState> {
            state.symptoms.push(veritas_contracts::turn::Symptom {
                name: "chest pain".to_string(),
                duration: None,
                severity: None,
                site: None,
                modifiers: vec![],
            });
            Ok(state)
        }
    }

    #[tokio::test]
    async fn mid_loop_emergency_intent_redirects_without_running_recommender() {
        // DiagnosisEngine raising Emergency mid-loop must produce the redirect
        // itself, never a Recommender-composed differential (I4/P4).
        let turn_loop = TurnLoop::new(
            vec![Arc::new(StubSymptomExtractor), Arc::new(StubDiagnosisEngine), Arc::new(StubRecommender)],
            guardrail(),
        );
        let outcome = turn_loop.run_turn("sess-1", "my chest really hurts a lot today", None, vec![], None, UserRiskProfile::new()).await.unwrap();
        assert_eq!(outcome.state.guardrail_action, Some(GuardrailAction::Redirect));
        assert_eq!(outcome.state.final_response.as_deref(), Some(EMERGENCY_REDIRECT_MESSAGE));
    }

    #[tokio::test]
    async fn dispatch_to_an_unregistered_node_is_an_error() {
        // No SymptomExtractor registered: the Supervisor still wants to
        // dispatch to it for a symptoms-intent turn, and the loop must
        // surface that as an error rather than silently dropping the turn.
        let turn_loop = TurnLoop::new(vec![Arc::new(StubRecommender)], guardrail());
        let result = turn_loop.run_turn("sess-1", "I have a bad cough and fever", None, vec![], None, UserRiskProfile::new()).await;
        assert!(result.is_err(), "dispatch to an unregistered node should surface as an error, not silently drop the turn");
    }
}
