//! §6's transport-agnostic core surface: `chat`, the `appointment.*`
//! operations, `knowledge.search`, and `guardrail.report`. This is the one
//! entry point `demo`/`tui` depend on instead of wiring a `TurnLoop`
//! themselves — the graph is built once here, per §5.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;
use veritas_collaborators::{AppointmentStore, KnowledgeStore};
use veritas_contracts::{
    appointment::{Appointment, AppointmentFields},
    error::VeritasResult,
    risk::UserRiskProfile,
    turn::{AppointmentDraft, HistoryEntry, ImageRef},
};
use veritas_guardrail::GuardrailReport;

use crate::turn_loop::TurnLoop;

struct SessionState {
    history: Vec<HistoryEntry>,
    risk: UserRiskProfile,
    appointment_draft: Option<AppointmentDraft>,
}

/// The response shape `chat` returns to a transport layer (§6).
pub struct ChatResponse {
    pub response: String,
    pub updated_history: Vec<HistoryEntry>,
    pub trace_id: String,
}

/// Owns the turn loop plus the collaborators needed for the non-turn
/// operations (`appointment.*`, `knowledge.search`) and per-session state.
/// Sessions live only in memory — persistence to a real store is left to the
/// hosting application.
pub struct VeritasCore {
    turn_loop: TurnLoop,
    appointments: std::sync::Arc<dyn AppointmentStore>,
    knowledge: std::sync::Arc<dyn KnowledgeStore>,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl VeritasCore {
    pub fn new(
        turn_loop: TurnLoop,
        appointments: std::sync::Arc<dyn AppointmentStore>,
        knowledge: std::sync::Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self { turn_loop, appointments, knowledge, sessions: Mutex::new(HashMap::new()) }
    }

    /// §6: `chat(session_id, user_input, image?, history) -> {response,
    /// updated_history, trace_id}`. History is taken from the session store
    /// when present; an explicit `seed_history` is only consulted for a
    /// brand-new session.
    pub async fn chat(&self, session_id: &str, user_input: &str, image: Option<ImageRef>) -> VeritasResult<ChatResponse> {
        let (history, risk, appointment_draft) = {
            let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
            match sessions.remove(session_id) {
                Some(s) => (s.history, s.risk, s.appointment_draft),
                None => (Vec::new(), UserRiskProfile::new(), None),
            }
        };

        let outcome = self.turn_loop.run_turn(session_id, user_input, image, history, appointment_draft, risk).await?;

        let trace_id = Uuid::new_v4().to_string();
        let response = outcome.state.final_response.clone().unwrap_or_default();
        let updated_history = outcome.history.clone();

        let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
        sessions.insert(
            session_id.to_string(),
            SessionState { history: outcome.history, risk: outcome.risk, appointment_draft: outcome.state.appointment_draft },
        );

        Ok(ChatResponse { response, updated_history, trace_id })
    }

    pub async fn appointment_create(&self, fields: AppointmentFields) -> VeritasResult<Appointment> {
        self.appointments.insert(fields).await
    }

    pub async fn appointment_get(&self, id: &str) -> VeritasResult<Appointment> {
        self.appointments.get(id).await
    }

    pub async fn appointment_cancel(&self, id: &str) -> VeritasResult<Appointment> {
        self.appointments.cancel(id).await
    }

    pub async fn appointment_list(&self, patient_name: &str) -> VeritasResult<Vec<Appointment>> {
        self.appointments.list_for_patient(patient_name).await
    }

    pub async fn knowledge_search(&self, topic: &str) -> VeritasResult<Option<veritas_collaborators::FaqResult>> {
        self.knowledge.lookup(topic).await
    }

    /// §6: `guardrail.report(window?) -> {total_incidents, by_kind,
    /// by_severity, ...}`. `None` when the selected tier keeps no incident
    /// log (only Tier 3 does).
    pub fn guardrail_report(&self, window: Option<chrono::Duration>) -> Option<GuardrailReport> {
        self.turn_loop.incident_log().map(|log| log.report(window))
    }
}
