use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// One entry of a prescription, kept in the order it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationLine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Prescription {
    pub id: i64,
    #[serde(rename = "appointment")]
    pub appointment_id: i64,
    pub diagnosis: String,
    pub medications: Json<Vec<MedicationLine>>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
