//! Appointment persistence types (§3, §4.10).
//!
//! An `Appointment` is unique by `id`; the store additionally enforces
//! uniqueness on (date, time, provider) — see `veritas_collaborators`'s
//! `AppointmentStore` trait for the atomicity contract (P5).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a booked appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

/// A persisted appointment record.
///
/// `id` is opaque and shown to the user; possession of it is treated as the
/// capability to cancel/modify the booking (§4.10's documented Open Question
/// resolution — see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_name: String,
    pub phone: String,
    pub reason: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub provider: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// The fields required to request a new booking, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentFields {
    pub patient_name: Option<String>,
    pub phone: Option<String>,
    pub reason: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub provider: Option<String>,
}

impl AppointmentFields {
    pub fn empty() -> Self {
        Self {
            patient_name: None,
            phone: None,
            reason: None,
            date: None,
            time: None,
            provider: None,
        }
    }

    /// Names of all fields still missing, in the order GATHERING should ask
    /// for them (§4.10).
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.patient_name.is_none() {
            missing.push("patient_name");
        }
        if self.phone.is_none() {
            missing.push("phone");
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.time.is_none() {
            missing.push("time");
        }
        if self.reason.is_none() {
            missing.push("reason");
        }
        missing
    }
}
