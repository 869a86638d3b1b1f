use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;

/// Any status may follow any other; no transition graph is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

text_enum!(AppointmentStatus, "status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Pending
    }
}

/// An appointment row joined with display names of both participants.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: i64,
    #[serde(rename = "doctor")]
    pub doctor_id: i64,
    pub doctor_name: String,
    #[serde(rename = "patient")]
    pub patient_id: i64,
    pub patient_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The (doctor, date, time) tuple that at most one appointment may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot {
            doctor_id: self.doctor_id,
            date: self.appointment_date,
            time: self.appointment_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pending", AppointmentStatus::Pending)]
    #[test_case("confirmed", AppointmentStatus::Confirmed)]
    #[test_case("completed", AppointmentStatus::Completed)]
    #[test_case("cancelled", AppointmentStatus::Cancelled)]
    fn status_parses(raw: &str, expected: AppointmentStatus) {
        assert_eq!(raw.parse::<AppointmentStatus>().unwrap(), expected);
        assert_eq!(expected.as_str(), raw);
    }

    #[test_case("bogus")]
    #[test_case("Pending")]
    #[test_case("")]
    fn status_rejects_unknown(raw: &str) {
        assert!(raw.parse::<AppointmentStatus>().is_err());
    }
}
