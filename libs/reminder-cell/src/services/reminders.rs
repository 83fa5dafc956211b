// libs/reminder-cell/src/services/reminders.rs
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Reminder, ReminderError, ReminderStatus};

#[derive(Debug, Deserialize)]
struct AppointmentId {
    id: Uuid,
}

pub struct ReminderService {
    supabase: Arc<SupabaseClient>,
}

impl ReminderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// All reminders, optionally filtered by status, ordered by scheduled time.
    pub async fn list_all(
        &self,
        status: Option<ReminderStatus>,
        auth_token: &str,
    ) -> Result<Vec<Reminder>, ReminderError> {
        let mut query_parts = Vec::new();
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=scheduled_at.asc".to_string());

        let path = format!("/rest/v1/reminders?{}", query_parts.join("&"));
        debug!("Listing reminders: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))
    }

    /// Reminders restricted to a student's own appointments.
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
        status: Option<ReminderStatus>,
        auth_token: &str,
    ) -> Result<Vec<Reminder>, ReminderError> {
        let appointments_path = format!(
            "/rest/v1/agenda_appointments?student_id=eq.{}&select=id",
            student_id
        );
        let appointment_ids: Vec<AppointmentId> = self
            .supabase
            .request(Method::GET, &appointments_path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = appointment_ids
            .iter()
            .map(|a| a.id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut query_parts = vec![format!("appointment_id=in.({})", id_list)];
        if let Some(status) = status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=scheduled_at.asc".to_string());

        let path = format!("/rest/v1/reminders?{}", query_parts.join("&"));
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))
    }
}
