//! The per-turn mutable record and its constituent types.
//!
//! `TurnState` is created once per turn from history + input and discarded
//! after `final_response` is emitted. It is mutated only by the single agent
//! the Supervisor dispatches to at each step (single-writer invariant, I1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::appointment::AppointmentFields;

/// The role of one entry in conversational history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of prior conversational history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

/// An opaque reference to an uploaded image, plus its declared MIME type.
///
/// The core never decodes or stores image bytes itself — it is handed a
/// reference (e.g. a blob store key or data URI) and passes it through to
/// `ImageAnalyzer`'s collaborator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub blob_ref: String,
    pub mime_type: String,
}

/// The classified intent of the current turn (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Faq,
    Appointment,
    Symptoms,
    ImageAnalysis,
    Emergency,
    OutOfScope,
    Unknown,
}

/// Severity of a reported symptom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

/// A single structured symptom extracted from free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symptom {
    pub name: String,
    pub duration: Option<String>,
    pub severity: Option<Severity>,
    pub site: Option<String>,
    pub modifiers: Vec<String>,
}

/// Structured output of `ImageAnalyzer`: a description plus focused Q&A,
/// produced by a single batched model call (§4.3 — never one call per
/// question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub description: String,
    pub visual_qa: Vec<(String, String)>,
    pub confidence: f64,
}

/// One ranked diagnostic hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisHypothesis {
    pub hypothesis: String,
    pub rationale: String,
    pub probability: f64,
    pub red_flag: bool,
}

/// A follow-up question or test proposed by `InvestigationGenerator`,
/// annotated with which hypotheses it discriminates between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investigation {
    pub prompt: String,
    pub reason: String,
    pub targets: Vec<String>,
}

/// A retrieved and reranked evidence passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePassage {
    pub passage: String,
    pub source_id: String,
    pub relevance: f64,
}

/// Status of one entry in the Supervisor's working-memory plan (I6: must
/// transition monotonically pending → current → done|skipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Current,
    Done,
    Skipped,
}

/// One entry in the Supervisor's plan — its own working memory, not a
/// directive to the agent beyond naming it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent: String,
    pub status: PlanStatus,
    pub note: Option<String>,
}

/// Append-only record of one agent activation within a turn (§3 `messages`,
/// P2: these form a strict total order matching dispatch order). This is a
/// truncated, spec-visible projection; the full record lives in the
/// hash-chained audit log (`veritas-audit`) that each `TurnNode` writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub input_digest: String,
    pub output_digest: String,
    pub warning: Option<String>,
}

/// The outcome of a guardrail pass (§4.11). Not an error — a first-class
/// control-flow result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailAction {
    Allow,
    Warn,
    Redirect,
    Block,
}

/// The in-progress state of a single booking, carried across turns until it
/// reaches COMMITTED or FAILED (§4.10). Lives on `TurnState` rather than in
/// the agent's own `AgentState.context` because the Supervisor needs to see
/// `attempts` to decide when AppointmentAgent's turn is actually done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentPhase {
    Gathering,
    Validating,
    Confirming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub phase: AppointmentPhase,
    pub fields: AppointmentFields,
    pub attempts: u32,
}

impl AppointmentDraft {
    pub fn new() -> Self {
        Self { phase: AppointmentPhase::Gathering, fields: AppointmentFields::empty(), attempts: 0 }
    }
}

impl Default for AppointmentDraft {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-turn mutable record (§3). Mutated only by the active agent;
/// inspected by the Supervisor between steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub session_id: String,
    pub user_input: String,
    pub image: Option<ImageRef>,
    pub history: Vec<HistoryEntry>,
    pub intent: Option<Intent>,
    pub symptoms: Vec<Symptom>,
    pub image_analysis: Option<ImageAnalysis>,
    pub diagnosis: Vec<DiagnosisHypothesis>,
    pub investigations: Vec<Investigation>,
    pub evidence: Vec<EvidencePassage>,
    pub plan: Vec<PlanStep>,
    pub messages: Vec<TurnMessage>,
    pub final_response: Option<String>,
    pub guardrail_action: Option<GuardrailAction>,
    pub appointment_draft: Option<AppointmentDraft>,
}

impl TurnState {
    /// Start a new turn from prior history and the current user input.
    pub fn new(session_id: impl Into<String>, user_input: impl Into<String>, image: Option<ImageRef>, history: Vec<HistoryEntry>) -> Self {
        Self {
            session_id: session_id.into(),
            user_input: user_input.into(),
            image,
            history,
            intent: None,
            symptoms: Vec::new(),
            image_analysis: None,
            diagnosis: Vec::new(),
            investigations: Vec::new(),
            evidence: Vec::new(),
            plan: Vec::new(),
            messages: Vec::new(),
            final_response: None,
            guardrail_action: None,
            appointment_draft: None,
        }
    }

    /// I4/I5 helper: true once the turn has a response to deliver.
    pub fn is_terminal(&self) -> bool {
        self.final_response.is_some()
    }

    /// The top (highest-probability) diagnostic hypothesis, if any, with
    /// deterministic alphabetical tie-breaking per §4.5.
    pub fn top_hypothesis(&self) -> Option<&DiagnosisHypothesis> {
        self.diagnosis.iter().max_by(|a, b| {
            a.probability
                .partial_cmp(&b.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.hypothesis.cmp(&a.hypothesis))
        })
    }

    /// Append a truncated transition record (§A.1's projection of the audit
    /// chain into spec-visible history).
    pub fn record_message(&mut self, agent: &str, input_digest: String, output_digest: String, warning: Option<String>) {
        self.messages.push(TurnMessage {
            agent: agent.to_string(),
            timestamp: Utc::now(),
            input_digest,
            output_digest,
            warning,
        });
    }
}
