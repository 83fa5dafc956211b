// libs/academic-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// ACADEMIC PATIENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicPatient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub cedula: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub allergies: Option<String>,
    pub created_by_professor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub cedula: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub cedula: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_conditions: Option<String>,
    pub allergies: Option<String>,
}

// ==============================================================================
// ACADEMIC APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicAppointment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub professor_id: Uuid,
    pub patient_name: String,
    pub reason: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAcademicAppointmentRequest {
    pub student_id: Uuid,
    pub patient_name: String,
    pub reason: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAcademicAppointmentRequest {
    pub patient_name: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

// ==============================================================================
// ACADEMIC REMINDER MODELS
// ==============================================================================

/// Rows created alongside an academic appointment; the reminder worker flips
/// their status from pending to due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicReminder {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub channel: String,
    pub target: String,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// CLINICAL HISTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicClinicalHistory {
    pub id: Uuid,
    pub student_id: Uuid,
    pub data: serde_json::Value,
    pub status: ClinicalHistoryStatus,
    pub reviewed_by_professor_id: Option<Uuid>,
    pub professor_comments: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalHistoryStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for ClinicalHistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClinicalHistoryStatus::Draft => write!(f, "draft"),
            ClinicalHistoryStatus::Submitted => write!(f, "submitted"),
            ClinicalHistoryStatus::Approved => write!(f, "approved"),
            ClinicalHistoryStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHistoryRequest {
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateHistoryRequest {
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewHistoryRequest {
    pub approved: bool,
    pub comments: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AcademicError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Clinical history not found")]
    HistoryNotFound,

    #[error("Student user not found")]
    StudentNotFound,

    #[error("Professor user not found")]
    ProfessorNotFound,

    #[error("Clinical history can only be edited while in draft")]
    HistoryNotEditable,

    #[error("Clinical history is not awaiting review")]
    HistoryNotReviewable,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
