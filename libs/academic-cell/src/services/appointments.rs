// libs/academic-cell/src/services/appointments.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AcademicAppointment, AcademicError, CreateAcademicAppointmentRequest,
    UpdateAcademicAppointmentRequest,
};

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
}

pub struct AcademicAppointmentService {
    supabase: Arc<SupabaseClient>,
}

impl AcademicAppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_appointments(
        &self,
        student_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Vec<AcademicAppointment>, AcademicError> {
        let mut query_parts = Vec::new();
        if let Some(student_id) = student_id {
            query_parts.push(format!("student_id=eq.{}", student_id));
        }
        if let Some(from) = from {
            query_parts.push(format!(
                "start_at=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = to {
            query_parts.push(format!(
                "start_at=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }
        query_parts.push("order=start_at.asc".to_string());

        let path = format!("/rest/v1/academic_appointments?{}", query_parts.join("&"));
        debug!("Listing academic appointments: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AcademicAppointment, AcademicError> {
        let path = format!("/rest/v1/academic_appointments?id=eq.{}", appointment_id);
        let rows: Vec<AcademicAppointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(AcademicError::AppointmentNotFound)
    }

    /// Create an appointment and its two academic reminders: 24 hours before
    /// for the professor and 2 hours before for the student.
    pub async fn create_appointment(
        &self,
        professor_id: Uuid,
        request: CreateAcademicAppointmentRequest,
        auth_token: &str,
    ) -> Result<AcademicAppointment, AcademicError> {
        if request.end_at <= request.start_at {
            return Err(AcademicError::ValidationError(
                "Appointment end must be after start".to_string(),
            ));
        }

        let student = self
            .fetch_user(request.student_id, auth_token)
            .await?
            .ok_or(AcademicError::StudentNotFound)?;
        let professor = self
            .fetch_user(professor_id, auth_token)
            .await?
            .ok_or(AcademicError::ProfessorNotFound)?;

        let now = Utc::now();
        let body = json!({
            "student_id": request.student_id,
            "professor_id": professor_id,
            "patient_name": request.patient_name,
            "reason": request.reason,
            "start_at": request.start_at.to_rfc3339(),
            "end_at": request.end_at.to_rfc3339(),
            "status": "pending",
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let appointment: AcademicAppointment = self
            .supabase
            .insert_returning("/rest/v1/academic_appointments", Some(auth_token), body)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        self.create_academic_reminders(&appointment, &professor, &student, auth_token)
            .await?;

        info!(
            "Academic appointment {} created for student {}",
            appointment.id, request.student_id
        );
        Ok(appointment)
    }

    async fn create_academic_reminders(
        &self,
        appointment: &AcademicAppointment,
        professor: &UserRecord,
        student: &UserRecord,
        auth_token: &str,
    ) -> Result<(), AcademicError> {
        let message = format!(
            "Recordatorio: cita el {}",
            appointment.start_at.format("%d/%m/%Y %H:%M")
        );

        let reminders = json!([
            {
                "appointment_id": appointment.id,
                "channel": "email",
                "target": professor.email.clone().unwrap_or_else(|| professor.id.to_string()),
                "message": message,
                "scheduled_at": (appointment.start_at - ChronoDuration::hours(24)).to_rfc3339(),
                "status": "pending"
            },
            {
                "appointment_id": appointment.id,
                "channel": "email",
                "target": student.email.clone().unwrap_or_else(|| student.id.to_string()),
                "message": message,
                "scheduled_at": (appointment.start_at - ChronoDuration::hours(2)).to_rfc3339(),
                "status": "pending"
            }
        ]);

        let _: Vec<Value> = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/academic_reminders",
                Some(auth_token),
                Some(reminders),
            )
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        debug!("Created academic reminders for appointment {}", appointment.id);
        Ok(())
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAcademicAppointmentRequest,
        auth_token: &str,
    ) -> Result<AcademicAppointment, AcademicError> {
        self.get_appointment(appointment_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(v) = request.patient_name {
            update_data.insert("patient_name".to_string(), json!(v));
        }
        if let Some(v) = request.reason {
            update_data.insert("reason".to_string(), json!(v));
        }
        if let Some(v) = request.notes {
            update_data.insert("notes".to_string(), json!(v));
        }
        if let Some(v) = request.status {
            update_data.insert("status".to_string(), json!(v));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/academic_appointments?id=eq.{}", appointment_id);
        self.supabase
            .patch_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AcademicError> {
        self.get_appointment(appointment_id, auth_token).await?;

        let reminders_path = format!(
            "/rest/v1/academic_reminders?appointment_id=eq.{}",
            appointment_id
        );
        if let Err(e) = self.supabase.delete(&reminders_path, Some(auth_token)).await {
            tracing::warn!(
                "Failed to delete academic reminders for appointment {}: {}",
                appointment_id,
                e
            );
        }

        let path = format!("/rest/v1/academic_appointments?id=eq.{}", appointment_id);
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        info!("Academic appointment {} deleted", appointment_id);
        Ok(())
    }

    async fn fetch_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<UserRecord>, AcademicError> {
        let path = format!("/rest/v1/users?id=eq.{}&select=id,email", user_id);
        let rows: Vec<UserRecord> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().next())
    }
}
