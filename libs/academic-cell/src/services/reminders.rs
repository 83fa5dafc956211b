// libs/academic-cell/src/services/reminders.rs
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AcademicError, AcademicReminder};

#[derive(Debug, Deserialize)]
struct AppointmentId {
    id: Uuid,
}

pub struct AcademicReminderService {
    supabase: Arc<SupabaseClient>,
}

impl AcademicReminderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// All academic reminders, optionally narrowed to one appointment.
    pub async fn list_all(
        &self,
        appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AcademicReminder>, AcademicError> {
        let mut query_parts = Vec::new();
        if let Some(appointment_id) = appointment_id {
            query_parts.push(format!("appointment_id=eq.{}", appointment_id));
        }
        query_parts.push("order=scheduled_at.asc".to_string());

        let path = format!("/rest/v1/academic_reminders?{}", query_parts.join("&"));
        debug!("Listing academic reminders: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }

    /// Reminders restricted to appointments booked for the student.
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
        appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AcademicReminder>, AcademicError> {
        let appointments_path = format!(
            "/rest/v1/academic_appointments?student_id=eq.{}&select=id",
            student_id
        );
        let appointment_ids: Vec<AppointmentId> = self
            .supabase
            .request(Method::GET, &appointments_path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))?;

        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        // An explicit filter outside the student's own appointments yields
        // nothing rather than leaking another student's reminders.
        if let Some(filter) = appointment_id {
            if !appointment_ids.iter().any(|a| a.id == filter) {
                return Ok(Vec::new());
            }
            return self.list_all(Some(filter), auth_token).await;
        }

        let id_list = appointment_ids
            .iter()
            .map(|a| a.id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let path = format!(
            "/rest/v1/academic_reminders?appointment_id=in.({})&order=scheduled_at.asc",
            id_list
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AcademicError::DatabaseError(e.to_string()))
    }
}
