//! The Supervisor: a pure, deterministically testable priority function
//! (§4.1, §9's design note — "policy, not orchestration glue").
//!
//! Intent classification here is the deterministic keyword-scan fallback
//! §4.1 describes for when an LLM classifier's output cannot be parsed —
//! kept as the only classifier so `decide` stays pure and unit-testable
//! without a collaborator.

use veritas_contracts::turn::{GuardrailAction, Intent, PlanStatus, PlanStep, TurnState};

/// Probability below which the top hypothesis still needs more discriminating
/// evidence before a recommendation is safe to generate (§4.1 priority 8).
pub const INVESTIGATION_SKIP_THRESHOLD: f64 = 0.7;

/// One of the eight dispatchable node names, or `Terminate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAgent {
    ImageAnalyzer,
    SymptomExtractor,
    DiagnosisEngine,
    InvestigationGenerator,
    DocumentRetriever,
    Recommender,
    ConversationAgent,
    AppointmentAgent,
    Terminate,
}

impl NextAgent {
    pub fn name(&self) -> &'static str {
        match self {
            NextAgent::ImageAnalyzer => "ImageAnalyzer",
            NextAgent::SymptomExtractor => "SymptomExtractor",
            NextAgent::DiagnosisEngine => "DiagnosisEngine",
            NextAgent::InvestigationGenerator => "InvestigationGenerator",
            NextAgent::DocumentRetriever => "DocumentRetriever",
            NextAgent::Recommender => "Recommender",
            NextAgent::ConversationAgent => "ConversationAgent",
            NextAgent::AppointmentAgent => "AppointmentAgent",
            NextAgent::Terminate => "TERMINATE",
        }
    }
}

/// The Supervisor's decision for one iteration of the turn loop.
#[derive(Debug, Clone)]
pub struct Decision {
    pub next_agent: NextAgent,
    pub reasoning: String,
}

fn classify_intent(state: &TurnState) -> Intent {
    let text = state.user_input.to_lowercase();

    const EMERGENCY_TERMS: &[&str] = &["chest pain", "can't breathe", "cannot breathe", "unconscious", "severe bleeding"];
    const APPOINTMENT_TERMS: &[&str] = &["book an appointment", "book me", "schedule an appointment", "reschedule", "cancel my appointment"];
    const FAQ_TERMS: &[&str] = &["hours", "insurance", "parking", "location", "where are you"];
    const OUT_OF_SCOPE_TERMS: &[&str] = &["weather", "stock price", "sports score"];

    if EMERGENCY_TERMS.iter().any(|t| text.contains(t)) {
        return Intent::Emergency;
    }
    if state.image.is_some() {
        return Intent::ImageAnalysis;
    }
    if APPOINTMENT_TERMS.iter().any(|t| text.contains(t)) {
        return Intent::Appointment;
    }
    if FAQ_TERMS.iter().any(|t| text.contains(t)) {
        return Intent::Faq;
    }
    if OUT_OF_SCOPE_TERMS.iter().any(|t| text.contains(t)) {
        return Intent::OutOfScope;
    }
    if text.trim().is_empty() {
        return Intent::Unknown;
    }
    Intent::Symptoms
}

fn seed_plan(state: &mut TurnState, intent: Intent) {
    let agents: Vec<&'static str> = match intent {
        Intent::Emergency => vec![],
        Intent::Faq => vec!["ConversationAgent"],
        Intent::Appointment => vec!["AppointmentAgent"],
        Intent::ImageAnalysis => vec!["ImageAnalyzer", "SymptomExtractor", "DiagnosisEngine", "InvestigationGenerator", "DocumentRetriever", "Recommender"],
        Intent::Symptoms => vec!["SymptomExtractor", "DiagnosisEngine", "InvestigationGenerator", "DocumentRetriever", "Recommender"],
        Intent::OutOfScope | Intent::Unknown => vec!["Recommender"],
    };
    state.plan = agents
        .into_iter()
        .enumerate()
        .map(|(i, agent)| PlanStep {
            agent: agent.to_string(),
            status: if i == 0 { PlanStatus::Current } else { PlanStatus::Pending },
            note: None,
        })
        .collect();
}

/// True once `agent_name`'s plan entry has already run to completion (or was
/// skipped) this turn. A node whose step is `Done`/`Skipped` is never
/// re-dispatched even if the state field it populates is still empty — an
/// empty result is a valid outcome (§4.4, §4.7/P9), not a retry signal.
fn already_ran(state: &TurnState, agent_name: &str) -> bool {
    state.plan.iter().any(|step| step.agent == agent_name && matches!(step.status, PlanStatus::Done | PlanStatus::Skipped))
}

fn mark_current(state: &mut TurnState, agent_name: &str) {
    for step in &mut state.plan {
        step.status = if step.agent == agent_name { PlanStatus::Current } else if step.status == PlanStatus::Current { PlanStatus::Done } else { step.status };
    }
}

/// Transition `agent_name`'s plan entry to `Done`. Called by the turn loop
/// right after a dispatched node finishes running, independent of whether
/// the node's output changed any `TurnState` field — an empty result still
/// counts as having run (§4.4, P9).
pub fn mark_done(state: &mut TurnState, agent_name: &str) {
    for step in &mut state.plan {
        if step.agent == agent_name {
            step.status = PlanStatus::Done;
        }
    }
}

/// Decide the next agent to dispatch, or TERMINATE, applying §4.1's
/// priority list in order. Mutates `state.intent` and `state.plan` as a side
/// effect of classification/sequencing (the Supervisor's own working
/// memory, not a directive to the agent — I6).
pub fn decide(state: &mut TurnState) -> Decision {
    if state.guardrail_action == Some(GuardrailAction::Block) || state.guardrail_action == Some(GuardrailAction::Redirect) {
        return Decision { next_agent: NextAgent::Terminate, reasoning: "guardrail already terminated this turn".to_string() };
    }

    if state.intent.is_none() {
        let intent = classify_intent(state);
        state.intent = Some(intent);
        seed_plan(state, intent);
        if intent == Intent::Emergency {
            return Decision { next_agent: NextAgent::Terminate, reasoning: "emergency intent classified, redirecting".to_string() };
        }
    }

    let intent = state.intent.expect("set above");

    if intent == Intent::Emergency {
        return Decision { next_agent: NextAgent::Terminate, reasoning: "emergency intent, guardrail owns the redirect text".to_string() };
    }

    if intent == Intent::Faq && state.diagnosis.is_empty() && state.investigations.is_empty() {
        if state.final_response.is_some() {
            return Decision { next_agent: NextAgent::Terminate, reasoning: "faq answered".to_string() };
        }
        mark_current(state, "ConversationAgent");
        return Decision { next_agent: NextAgent::ConversationAgent, reasoning: "faq intent with no open diagnostic context".to_string() };
    }

    if intent == Intent::Appointment {
        if state.final_response.is_some() {
            return Decision { next_agent: NextAgent::Terminate, reasoning: "appointment flow produced a response".to_string() };
        }
        mark_current(state, "AppointmentAgent");
        return Decision { next_agent: NextAgent::AppointmentAgent, reasoning: "appointment intent".to_string() };
    }

    if state.image.is_some() && state.image_analysis.is_none() {
        mark_current(state, "ImageAnalyzer");
        return Decision { next_agent: NextAgent::ImageAnalyzer, reasoning: "image present, not yet analyzed".to_string() };
    }

    let input_non_trivial = state.user_input.split_whitespace().count() >= 2;
    if state.symptoms.is_empty() && !already_ran(state, "SymptomExtractor") && (input_non_trivial || state.image_analysis.is_some()) {
        mark_current(state, "SymptomExtractor");
        return Decision { next_agent: NextAgent::SymptomExtractor, reasoning: "no structured symptoms yet".to_string() };
    }

    if state.diagnosis.is_empty() && !already_ran(state, "DiagnosisEngine") {
        mark_current(state, "DiagnosisEngine");
        return Decision { next_agent: NextAgent::DiagnosisEngine, reasoning: "no diagnosis hypotheses yet".to_string() };
    }

    let top_probability = state.top_hypothesis().map(|h| h.probability).unwrap_or(0.0);
    if state.investigations.is_empty() && top_probability < INVESTIGATION_SKIP_THRESHOLD && !already_ran(state, "InvestigationGenerator") {
        mark_current(state, "InvestigationGenerator");
        return Decision { next_agent: NextAgent::InvestigationGenerator, reasoning: format!("top hypothesis probability {top_probability:.2} below threshold") };
    }

    if state.evidence.is_empty() && !already_ran(state, "DocumentRetriever") {
        mark_current(state, "DocumentRetriever");
        return Decision { next_agent: NextAgent::DocumentRetriever, reasoning: "no retrieved evidence yet".to_string() };
    }

    if state.final_response.is_none() {
        mark_current(state, "Recommender");
        return Decision { next_agent: NextAgent::Recommender, reasoning: "ready to compose final response".to_string() };
    }

    Decision { next_agent: NextAgent::Terminate, reasoning: "turn complete".to_string() }
}
