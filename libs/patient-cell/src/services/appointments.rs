// libs/patient-cell/src/services/appointments.rs
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AppointmentStatus, CreateAppointmentRequest, OdontologoAppointment, PatientError,
    UpdateAppointmentRequest,
};

/// Private appointment book of a solo practitioner. Rows carry the owning
/// odontologo's id and every query filters by it, so another tenant's
/// appointments read as missing.
pub struct AppointmentService {
    supabase: Arc<SupabaseClient>,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn list_appointments(
        &self,
        odontologo_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Vec<OdontologoAppointment>, PatientError> {
        let mut query_parts = vec![format!("odontologo_id=eq.{}", odontologo_id)];
        if let Some(start) = start {
            query_parts.push(format!(
                "start_at=gte.{}",
                urlencoding::encode(&start.to_rfc3339())
            ));
        }
        if let Some(end) = end {
            query_parts.push(format!(
                "end_at=lte.{}",
                urlencoding::encode(&end.to_rfc3339())
            ));
        }
        query_parts.push("order=start_at.asc".to_string());

        let path = format!("/rest/v1/odontologo_appointments?{}", query_parts.join("&"));
        debug!("Listing odontologo appointments: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn get_appointment(
        &self,
        odontologo_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<OdontologoAppointment, PatientError> {
        let path = format!(
            "/rest/v1/odontologo_appointments?id=eq.{}&odontologo_id=eq.{}",
            appointment_id, odontologo_id
        );
        let rows: Vec<OdontologoAppointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(PatientError::AppointmentNotFound)
    }

    pub async fn create_appointment(
        &self,
        odontologo_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<OdontologoAppointment, PatientError> {
        if request.patient_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "patient_name is required".to_string(),
            ));
        }
        if request.end_at <= request.start_at {
            return Err(PatientError::ValidationError(
                "end_at must be after start_at".to_string(),
            ));
        }

        let now = Utc::now();
        let status = request.status.unwrap_or(AppointmentStatus::Pending);
        let body = json!({
            "odontologo_id": odontologo_id,
            "patient_name": request.patient_name,
            "reason": request.reason,
            "start_at": request.start_at.to_rfc3339(),
            "end_at": request.end_at.to_rfc3339(),
            "notes": request.notes,
            "status": status.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let appointment: OdontologoAppointment = self
            .supabase
            .insert_returning("/rest/v1/odontologo_appointments", Some(auth_token), body)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!(
            "Appointment {} created for odontologo {}",
            appointment.id, odontologo_id
        );
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        odontologo_id: Uuid,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<OdontologoAppointment, PatientError> {
        let existing = self
            .get_appointment(odontologo_id, appointment_id, auth_token)
            .await?;

        let status = request.status.unwrap_or(existing.status);
        let update = json!({
            "patient_name": request.patient_name,
            "reason": request.reason,
            "notes": request.notes,
            "status": status.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!(
            "/rest/v1/odontologo_appointments?id=eq.{}&odontologo_id=eq.{}",
            appointment_id, odontologo_id
        );
        self.supabase
            .patch_returning(&path, Some(auth_token), update)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn delete_appointment(
        &self,
        odontologo_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        self.get_appointment(odontologo_id, appointment_id, auth_token)
            .await?;

        let path = format!(
            "/rest/v1/odontologo_appointments?id=eq.{}&odontologo_id=eq.{}",
            appointment_id, odontologo_id
        );
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }
}
