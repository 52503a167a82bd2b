//! Appointment persistence collaborator (§6, §4.10, P5).
//!
//! The store is the one place in the system required to provide an atomic
//! check-then-insert: two concurrent bookings for the same (date, time,
//! provider) must not both succeed (§5).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use veritas_contracts::{
    appointment::{Appointment, AppointmentFields, AppointmentStatus},
    error::{VeritasError, VeritasResult},
};

/// The appointment persistence collaborator.
#[async_trait::async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Atomically check for a (date, time, provider) conflict and insert if
    /// none exists. Returns `VeritasError::Conflict` if the slot is taken.
    async fn insert(&self, fields: AppointmentFields) -> VeritasResult<Appointment>;

    async fn get(&self, id: &str) -> VeritasResult<Appointment>;

    async fn cancel(&self, id: &str) -> VeritasResult<Appointment>;

    async fn list_for_patient(&self, patient_name: &str) -> VeritasResult<Vec<Appointment>>;
}

struct Index {
    by_id: HashMap<String, Appointment>,
    /// (date, time, provider) -> appointment id, for active (non-cancelled)
    /// bookings only.
    slot_index: HashMap<(chrono::NaiveDate, chrono::NaiveTime, String), String>,
}

/// An in-memory store guarded by a single mutex, matching the pattern
/// `InMemoryAuditWriter` already uses for its append-only state — the
/// simplest construct that gives atomic check-then-insert without a
/// database.
pub struct MockAppointmentStore {
    state: Mutex<Index>,
}

impl MockAppointmentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Index { by_id: HashMap::new(), slot_index: HashMap::new() }),
        }
    }

    fn slot_key(fields: &AppointmentFields) -> Option<(chrono::NaiveDate, chrono::NaiveTime, String)> {
        let date = fields.date?;
        let time = fields.time?;
        let provider = fields.provider.clone().unwrap_or_else(|| "any".to_string());
        Some((date, time, provider))
    }
}

impl Default for MockAppointmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AppointmentStore for MockAppointmentStore {
    async fn insert(&self, fields: AppointmentFields) -> VeritasResult<Appointment> {
        let missing = fields.missing_fields();
        if !missing.is_empty() {
            return Err(VeritasError::ValidationError {
                reason: format!("missing fields: {}", missing.join(", ")),
            });
        }

        let key = Self::slot_key(&fields).expect("all fields validated present above");

        let mut state = self.state.lock().expect("appointment store mutex poisoned");
        if state.slot_index.contains_key(&key) {
            return Err(VeritasError::Conflict {
                reason: format!("slot {:?} already booked", key),
            });
        }

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_name: fields.patient_name.expect("validated present"),
            phone: fields.phone.expect("validated present"),
            reason: fields.reason.expect("validated present"),
            date: fields.date.expect("validated present"),
            time: fields.time.expect("validated present"),
            provider: fields.provider,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
        };

        state.slot_index.insert(key, appointment.id.clone());
        state.by_id.insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: &str) -> VeritasResult<Appointment> {
        let state = self.state.lock().expect("appointment store mutex poisoned");
        state
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| VeritasError::NotFound { reason: format!("appointment {id}") })
    }

    async fn cancel(&self, id: &str) -> VeritasResult<Appointment> {
        let mut state = self.state.lock().expect("appointment store mutex poisoned");
        let appointment = state
            .by_id
            .get_mut(id)
            .ok_or_else(|| VeritasError::NotFound { reason: format!("appointment {id}") })?;
        appointment.status = AppointmentStatus::Cancelled;
        let result = appointment.clone();
        let key = (result.date, result.time, result.provider.clone().unwrap_or_else(|| "any".to_string()));
        state.slot_index.remove(&key);
        Ok(result)
    }

    async fn list_for_patient(&self, patient_name: &str) -> VeritasResult<Vec<Appointment>> {
        let state = self.state.lock().expect("appointment store mutex poisoned");
        Ok(state
            .by_id
            .values()
            .filter(|a| a.patient_name == patient_name)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn fields(time: NaiveTime) -> AppointmentFields {
        AppointmentFields {
            patient_name: Some("Jane Doe".to_string()),
            phone: Some("0901234567".to_string()),
            reason: Some("annual checkup".to_string()),
            date: Some(NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()),
            time: Some(time),
            provider: Some("dr-lee".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_succeeds_for_new_slot() {
        let store = MockAppointmentStore::new();
        let appt = store.insert(fields(NaiveTime::from_hms_opt(9, 0, 0).unwrap())).await.unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn insert_rejects_conflicting_slot() {
        let store = MockAppointmentStore::new();
        let slot = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        store.insert(fields(slot)).await.unwrap();
        let result = store.insert(fields(slot)).await;
        assert!(matches!(result, Err(VeritasError::Conflict { .. })));
    }

    #[tokio::test]
    async fn insert_rejects_missing_fields() {
        let store = MockAppointmentStore::new();
        let result = store.insert(AppointmentFields::empty()).await;
        assert!(matches!(result, Err(VeritasError::ValidationError { .. })));
    }

    #[tokio::test]
    async fn cancel_frees_the_slot_for_rebooking() {
        let store = MockAppointmentStore::new();
        let slot = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let appt = store.insert(fields(slot)).await.unwrap();
        store.cancel(&appt.id).await.unwrap();
        let rebooked = store.insert(fields(slot)).await;
        assert!(rebooked.is_ok());
    }

    #[tokio::test]
    async fn get_missing_id_returns_not_found() {
        let store = MockAppointmentStore::new();
        let result = store.get("does-not-exist").await;
        assert!(matches!(result, Err(VeritasError::NotFound { .. })));
    }
}
