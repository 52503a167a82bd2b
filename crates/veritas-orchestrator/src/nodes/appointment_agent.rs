//! §4.10: the GATHERING → VALIDATING → CONFIRMING → COMMITTED|FAILED
//! booking state machine, plus cancel-by-id.
//!
//! Field extraction is a deterministic heuristic (regex-based), not an LLM
//! call — there is no ambiguity-tolerant parsing requirement here the way
//! there is for symptom text, and keeping this node collaborator-free except
//! for the store keeps VALIDATING/GATHERING retries free of extra latency.

use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};
use regex::Regex;
use serde_json::json;
use veritas_collaborators::AppointmentStore;
use veritas_contracts::{
    agent::{AgentInput, AgentOutput, AgentState},
    appointment::{Appointment, AppointmentFields},
    error::{VeritasError, VeritasResult},
    turn::{AppointmentDraft, AppointmentPhase, TurnState},
    verify::OutputSchema,
};
use veritas_core::traits::Agent;

use crate::{support, turn_node::TurnNode};

/// Per-session attempt ceiling before escalating to FAILED (§4.10).
const MAX_ATTEMPTS: u32 = 3;

/// Clinic hours used by VALIDATING (kept as constants rather than threading
/// a config object through every node; §9's open question on tunables
/// applies equally here — see DESIGN.md).
const CLINIC_OPEN: (u32, u32) = (8, 0);
const CLINIC_CLOSE: (u32, u32) = (18, 0);

const ESCALATION_MESSAGE: &str = "I wasn't able to finish booking this appointment after a few tries. Please call the clinic directly to schedule.";

fn phone_regex() -> Regex {
    Regex::new(r"\b\d{9,11}\b").expect("static regex is valid")
}

fn cancel_id_regex() -> Regex {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").expect("static regex is valid")
}

fn name_regex() -> Regex {
    Regex::new(r"(?i)(?:my name is|i am|i'm|this is|name)\s+([A-Za-z][A-Za-z '-]{1,40})").expect("static regex is valid")
}

/// Resolve a bare weekday name ("tue", "tuesday") or "today"/"tomorrow" to
/// the next concrete calendar date on or after today. Returns `None` for any
/// other token.
fn parse_relative_date(word: &str) -> Option<NaiveDate> {
    let today = Utc::now().date_naive();
    let lower = word.to_lowercase();

    match lower.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today.checked_add_days(Days::new(1))?),
        _ => {}
    }

    let weekday = match lower.as_str() {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "weds" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };

    (1..=7u64)
        .map(|offset| today.checked_add_days(Days::new(offset)))
        .find_map(|candidate| candidate.filter(|d| d.weekday() == weekday))
}

/// Merge any newly extractable fields from `text` into `fields`, never
/// overwriting an already-known value.
fn merge_parsed_fields(fields: &mut AppointmentFields, text: &str) {
    if fields.phone.is_none() {
        if let Some(m) = phone_regex().find(text) {
            fields.phone = Some(m.as_str().to_string());
        }
    }
    if fields.patient_name.is_none() {
        if let Some(caps) = name_regex().captures(text) {
            fields.patient_name = Some(caps[1].trim().to_string());
        }
    }
    if fields.date.is_none() {
        for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
            for word in split_candidates(text) {
                if let Ok(d) = NaiveDate::parse_from_str(&word, fmt) {
                    fields.date = Some(d);
                    break;
                }
            }
            if fields.date.is_some() {
                break;
            }
        }
        if fields.date.is_none() {
            for word in split_candidates(text) {
                if let Some(d) = parse_relative_date(&word) {
                    fields.date = Some(d);
                    break;
                }
            }
        }
    }
    if fields.time.is_none() {
        for fmt in ["%H:%M", "%I:%M %p", "%I%p"] {
            for word in split_candidates(text) {
                if let Ok(t) = NaiveTime::parse_from_str(&word, fmt) {
                    fields.time = Some(t);
                    break;
                }
            }
            if fields.time.is_some() {
                break;
            }
        }
    }
    if fields.reason.is_none() && fields.patient_name.is_some() && fields.phone.is_some() && fields.date.is_some() && fields.time.is_some() {
        fields.reason = Some(text.to_string());
    }
}

/// Crude tokenizer that also emits 2-word joins, so "3:00 pm" survives as a
/// single candidate for time parsing.
fn split_candidates(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<String> = words.iter().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != ':' && c != '-' && c != '/').to_string()).collect();
    for pair in words.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

/// `None` if valid, `Some(reason)` describing the first violation otherwise.
fn validate(fields: &AppointmentFields) -> Option<String> {
    let date = fields.date?;
    if date < Utc::now().date_naive() {
        return Some("That date has already passed.".to_string());
    }
    let time = fields.time?;
    let open = NaiveTime::from_hms_opt(CLINIC_OPEN.0, CLINIC_OPEN.1, 0).expect("valid clinic hour");
    let close = NaiveTime::from_hms_opt(CLINIC_CLOSE.0, CLINIC_CLOSE.1, 0).expect("valid clinic hour");
    if time < open || time > close {
        return Some("That time is outside our clinic hours (8am-6pm).".to_string());
    }
    let phone = fields.phone.as_ref()?;
    if phone.chars().filter(|c| c.is_ascii_digit()).count() < 9 {
        return Some("That phone number doesn't look complete.".to_string());
    }
    None
}

pub struct AppointmentAgent {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentAgent {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    fn schema() -> OutputSchema {
        support::open_schema("appointment-v1")
    }

    async fn handle_cancel(&self, id: &str) -> VeritasResult<String> {
        match self.store.cancel(id).await {
            Ok(appt) => Ok(format!("Your appointment on {} at {} has been cancelled.", appt.date, appt.time)),
            Err(VeritasError::NotFound { .. }) => Ok("I couldn't find an appointment with that confirmation id.".to_string()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl Agent for AppointmentAgent {
    async fn propose(&self, _state: &AgentState, input: &AgentInput) -> VeritasResult<AgentOutput> {
        let fields: AppointmentFields = serde_json::from_value(input.payload["fields"].clone())
            .map_err(|e| VeritasError::ValidationError { reason: e.to_string() })?;
        let appointment = self.store.insert(fields).await?;
        let payload = serde_json::to_value(appointment).map_err(|e| VeritasError::SchemaValidation { reason: e.to_string() })?;
        Ok(AgentOutput { kind: "appointment_committed".to_string(), payload })
    }

    fn transition(&self, state: &AgentState, _output: &AgentOutput) -> VeritasResult<AgentState> {
        support::terminal_transition(state)
    }

    fn required_capabilities(&self, _state: &AgentState, _input: &AgentInput) -> Vec<String> {
        vec![support::COLLABORATOR_CAPABILITY.to_string()]
    }

    fn describe_action(&self, _state: &AgentState, _input: &AgentInput) -> (String, String) {
        ("book_appointment".to_string(), "turn_state/appointment".to_string())
    }

    fn is_terminal(&self, _state: &AgentState) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl TurnNode for AppointmentAgent {
    fn name(&self) -> &'static str {
        "AppointmentAgent"
    }

    async fn run(&self, mut state: TurnState) -> VeritasResult<TurnState> {
        if state.user_input.to_lowercase().contains("cancel") {
            if let Some(m) = cancel_id_regex().find(&state.user_input) {
                state.final_response = Some(self.handle_cancel(m.as_str()).await?);
                return Ok(state);
            }
        }

        let mut draft = state.appointment_draft.take().unwrap_or_default();
        merge_parsed_fields(&mut draft.fields, &state.user_input);

        let missing = draft.fields.missing_fields();
        if !missing.is_empty() {
            draft.phase = AppointmentPhase::Gathering;
            draft.attempts += 1;
            if draft.attempts >= MAX_ATTEMPTS {
                state.final_response = Some(ESCALATION_MESSAGE.to_string());
                state.appointment_draft = None;
                return Ok(state);
            }
            state.final_response = Some(format!("To book your appointment, could you share your {}?", missing.join(", ")));
            state.appointment_draft = Some(draft);
            return Ok(state);
        }

        draft.phase = AppointmentPhase::Validating;
        if let Some(reason) = validate(&draft.fields) {
            draft.attempts += 1;
            if draft.attempts >= MAX_ATTEMPTS {
                state.final_response = Some(ESCALATION_MESSAGE.to_string());
                state.appointment_draft = None;
                return Ok(state);
            }
            draft.fields.time = None;
            draft.phase = AppointmentPhase::Gathering;
            state.final_response = Some(format!("{reason} Could you share a different time?"));
            state.appointment_draft = Some(draft);
            return Ok(state);
        }

        draft.phase = AppointmentPhase::Confirming;
        let input = AgentInput { kind: "book_appointment".to_string(), payload: json!({ "fields": draft.fields }) };

        match support::run_node_step(self.name(), self, input, Self::schema()).await {
            Ok(payload) => {
                let appt: Appointment = serde_json::from_value(payload).map_err(|e| VeritasError::SchemaValidation { reason: e.to_string() })?;
                state.final_response = Some(format!(
                    "Your appointment is confirmed for {} at {} (confirmation id: {}).",
                    appt.date, appt.time, appt.id
                ));
                state.appointment_draft = None;
            }
            Err(VeritasError::Conflict { .. }) => {
                draft.attempts += 1;
                if draft.attempts >= MAX_ATTEMPTS {
                    state.final_response = Some(ESCALATION_MESSAGE.to_string());
                    state.appointment_draft = None;
                } else {
                    draft.fields.time = None;
                    draft.phase = AppointmentPhase::Gathering;
                    state.final_response = Some("That slot is already booked. Could you propose a different time?".to_string());
                    state.appointment_draft = Some(draft);
                }
            }
            Err(e) => return Err(e),
        }

        Ok(state)
    }
}
